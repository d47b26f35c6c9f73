use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Events the forecasting core emits as runs move through their
/// lifecycle. Consumed by the surrounding system (notifications, cache
/// invalidation, dashboard refresh).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    ForecastRunCompleted {
        run_id: Uuid,
        client_id: Uuid,
        recommended_method: String,
        result_rows: usize,
    },
    ForecastRunFailed {
        run_id: Uuid,
        client_id: Uuid,
        error: String,
    },
    SkuClassified {
        client_id: Uuid,
        item_id: String,
        abc_class: String,
        xyz_class: String,
        recommended_method: String,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Channel pair with a sender wrapper, for embedders and tests.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self::new(tx), rx)
    }

    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}
