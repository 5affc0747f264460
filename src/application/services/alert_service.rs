use crate::application::events::AlertEvent;
use crate::application::ports::local_store::LocalStore;
use crate::application::ports::notifier::{NotificationAction, NotificationSpec, Notifier, Urgency};
use crate::application::ports::server_api::ServerApi;
use crate::domain::entities::{CriticalAlert, PushPayload, QueuedChangeDraft};
use crate::domain::value_objects::{ChangeAction, Collection, Severity, SyncTag};
use crate::infrastructure::worker::{Connectivity, EventBus};
use crate::shared::clock::Clock;
use crate::shared::error::AppError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct PushReceipt {
    pub notification: NotificationSpec,
    /// Set when the push was persisted as a critical alert.
    pub alert: Option<CriticalAlert>,
    pub badge: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckDelivery {
    Delivered,
    Queued,
    AlreadyAcknowledged,
}

/// Builds the platform notification for a push. Severity decides how loud it is.
pub fn notification_for(push: &PushPayload) -> NotificationSpec {
    let (vibrate, urgency, require_interaction, renotify, silent): (&[u32], _, _, _, _) =
        match push.severity {
            Severity::Critical => (&[500, 200, 500, 200, 500], Urgency::High, true, true, false),
            Severity::Urgent => (&[300, 100, 300], Urgency::High, true, true, false),
            Severity::High => (&[200, 100, 200], Urgency::Normal, false, true, false),
            Severity::Normal => (&[200], Urgency::Normal, false, false, false),
            Severity::Info => (&[], Urgency::Low, false, false, true),
        };

    let subject = push
        .data
        .berth_number
        .as_deref()
        .or(push.data.operation_id.as_deref())
        .or(push.data.vessel_id.as_deref())
        .unwrap_or("general");

    let mut actions = vec![NotificationAction {
        action: "view".to_string(),
        title: "View".to_string(),
    }];
    if push.severity.is_critical_lane() {
        actions.insert(
            0,
            NotificationAction {
                action: "acknowledge".to_string(),
                title: "Acknowledge".to_string(),
            },
        );
    }

    NotificationSpec {
        title: push.title.clone(),
        body: push.body.clone(),
        tag: format!("{}-{subject}", push.kind),
        vibrate: vibrate.to_vec(),
        urgency,
        require_interaction,
        renotify,
        silent,
        actions,
        data: serde_json::to_value(&push.data).unwrap_or_default(),
    }
}

/// Persists and surfaces push alerts; critical ones survive being offline.
pub struct AlertService {
    store: Arc<dyn LocalStore>,
    server: Arc<dyn ServerApi>,
    notifier: Arc<dyn Notifier>,
    connectivity: Connectivity,
    events: EventBus<AlertEvent>,
    clock: Arc<dyn Clock>,
}

impl AlertService {
    pub fn new(
        store: Arc<dyn LocalStore>,
        server: Arc<dyn ServerApi>,
        notifier: Arc<dyn Notifier>,
        connectivity: Connectivity,
        events: EventBus<AlertEvent>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            server,
            notifier,
            connectivity,
            events,
            clock,
        }
    }

    pub fn events(&self) -> &EventBus<AlertEvent> {
        &self.events
    }

    pub async fn receive_raw(&self, raw: &str) -> Result<PushReceipt, AppError> {
        let push = PushPayload::parse(raw)?;
        self.receive_push(push).await
    }

    #[tracing::instrument(skip(self, push), fields(kind = %push.kind, severity = %push.severity))]
    pub async fn receive_push(&self, push: PushPayload) -> Result<PushReceipt, AppError> {
        let notification = notification_for(&push);

        // Persist before anything touches the network.
        let alert = if push.severity.is_critical_lane() {
            let alert = CriticalAlert::from_push(&push, self.clock.now());
            if self.store.save_alert(&alert).await? {
                tracing::info!(alert_id = %alert.id, "critical alert stored");
            }
            Some(alert)
        } else {
            None
        };

        if let Err(err) = self.notifier.show(&notification).await {
            tracing::warn!(error = %err, "failed to show notification");
        }
        if let Some(alert) = alert.as_ref() {
            self.events.publish(AlertEvent::Received(alert.clone()));
        }
        let badge = self.refresh_badge().await?;

        Ok(PushReceipt {
            notification,
            alert,
            badge,
        })
    }

    /// Marks the alert acknowledged locally, then tells the server directly
    /// or through the sync queue.
    #[tracing::instrument(skip(self))]
    pub async fn acknowledge(&self, alert_id: &str) -> Result<AckDelivery, AppError> {
        let at = self.clock.now();
        if !self.store.acknowledge_alert(alert_id, at).await? {
            return match self.store.get_alert(alert_id).await? {
                Some(_) => Ok(AckDelivery::AlreadyAcknowledged),
                None => Err(AppError::NotFound(format!("Alert {alert_id} not found"))),
            };
        }

        let delivery = if self.connectivity.is_online() {
            match self.server.acknowledge_alert(alert_id, at).await {
                Ok(()) => AckDelivery::Delivered,
                Err(err) => {
                    tracing::warn!(error = %err, "acknowledgement send failed; queueing");
                    self.queue_acknowledgement(alert_id, at).await?;
                    AckDelivery::Queued
                }
            }
        } else {
            self.queue_acknowledgement(alert_id, at).await?;
            AckDelivery::Queued
        };

        self.events.publish(AlertEvent::Acknowledged {
            id: alert_id.to_string(),
            delivered: delivery == AckDelivery::Delivered,
        });
        self.refresh_badge().await?;
        Ok(delivery)
    }

    async fn queue_acknowledgement(
        &self,
        alert_id: &str,
        at: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), AppError> {
        let draft = QueuedChangeDraft::new(
            Collection::CriticalAlerts,
            ChangeAction::Update,
            json!({
                "id": alert_id,
                "acknowledged": true,
                "acknowledged_at": at,
            }),
        )
        .with_tag(SyncTag::CriticalAlert);
        let change = self.store.enqueue(draft).await?;
        tracing::debug!(change_id = change.id, alert_id, "acknowledgement queued");
        Ok(())
    }

    pub async fn unacknowledged(&self) -> Result<Vec<CriticalAlert>, AppError> {
        self.store.list_alerts(false).await
    }

    /// Recomputes the badge from unacknowledged alerts and publishes it.
    pub async fn refresh_badge(&self) -> Result<u64, AppError> {
        let count = u64::try_from(self.store.unacknowledged_count().await?).unwrap_or(0);
        if let Err(err) = self.notifier.set_badge(count).await {
            tracing::warn!(error = %err, "failed to update badge");
        }
        self.events.publish(AlertEvent::BadgeChanged { count });
        Ok(count)
    }
}
