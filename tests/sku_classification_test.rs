mod common;

use common::{harness, history, request};
use demand_forecast_core::events::Event;
use demand_forecast_core::models::{AbcClass, DemandPattern, RunStatus, XyzClass};
use demand_forecast_core::repositories::ForecastStore;

#[tokio::test]
async fn run_persists_classification_for_each_valid_item() {
    let h = harness();
    h.store
        .seed_history(h.client_id, history("SKU-STEADY", &[10.0; 30]))
        .await;
    h.store
        .seed_history(h.client_id, history("SKU-SHORT", &[10.0; 3]))
        .await;

    let run = h
        .orchestrator
        .generate_forecast(request(h.client_id, &["SKU-STEADY", "SKU-SHORT"], 7))
        .await
        .unwrap();
    assert_eq!(run.status, RunStatus::Completed);

    let classification = h
        .store
        .get_classification(h.client_id, "SKU-STEADY")
        .await
        .unwrap()
        .expect("steady item classified");
    // only item in the batch: all revenue, perfectly stable demand
    assert_eq!(classification.abc_class, AbcClass::A);
    assert_eq!(classification.xyz_class, XyzClass::X);
    assert_eq!(classification.demand_pattern, DemandPattern::Regular);
    assert_eq!(classification.recommended_method, "foundation");
    assert!((classification.forecastability_score - 1.0).abs() < 1e-9);
    assert!((classification.revenue_contribution - 100.0).abs() < 1e-9);

    // items that fail validation are never classified
    assert!(h
        .store
        .get_classification(h.client_id, "SKU-SHORT")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn intermittent_demand_routes_the_run_to_croston() {
    let h = harness();
    // demand three days out of four: adi = 4/3, cv about 0.58
    let targets: Vec<f64> = (0..32)
        .map(|i| if i % 4 == 3 { 0.0 } else { 3.0 })
        .collect();
    h.store
        .seed_history(h.client_id, history("SKU-GAPPY", &targets))
        .await;

    let run = h
        .orchestrator
        .generate_forecast(request(h.client_id, &["SKU-GAPPY"], 7))
        .await
        .unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.recommended_method.as_deref(), Some("croston"));

    let classification = h
        .store
        .get_classification(h.client_id, "SKU-GAPPY")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(classification.demand_pattern, DemandPattern::Intermittent);
    assert_eq!(classification.xyz_class, XyzClass::Y);
    assert_eq!(classification.recommended_method, "croston");
    assert!(classification
        .warnings
        .iter()
        .any(|w| w.contains("intermittent")));
}

#[tokio::test]
async fn run_emits_classification_and_completion_events() {
    let mut h = harness();
    h.store
        .seed_history(h.client_id, history("SKU-1", &[10.0; 30]))
        .await;

    let run = h
        .orchestrator
        .generate_forecast(request(h.client_id, &["SKU-1"], 5))
        .await
        .unwrap();
    assert_eq!(run.status, RunStatus::Completed);

    let mut saw_classified = false;
    let mut saw_completed = false;
    while let Ok(event) = h.events.try_recv() {
        match event {
            Event::SkuClassified {
                client_id, item_id, ..
            } => {
                assert_eq!(client_id, h.client_id);
                assert_eq!(item_id, "SKU-1");
                saw_classified = true;
            }
            Event::ForecastRunCompleted {
                run_id,
                result_rows,
                ..
            } => {
                assert_eq!(run_id, run.id);
                assert!(result_rows > 0);
                saw_completed = true;
            }
            Event::ForecastRunFailed { .. } => panic!("run did not fail"),
        }
    }
    assert!(saw_classified);
    assert!(saw_completed);
}

#[tokio::test]
async fn failed_run_emits_failure_event() {
    let mut h = harness();
    let run = h
        .orchestrator
        .generate_forecast(request(h.client_id, &["SKU-ABSENT"], 5))
        .await
        .unwrap();
    assert_eq!(run.status, RunStatus::Failed);

    let mut saw_failed = false;
    while let Ok(event) = h.events.try_recv() {
        if let Event::ForecastRunFailed { run_id, error, .. } = event {
            assert_eq!(run_id, run.id);
            assert!(!error.is_empty());
            saw_failed = true;
        }
    }
    assert!(saw_failed);
}
