//! Payout state machine
//!
//! Every operation is one atomic unit against the store: the state change,
//! its event, and the read-model rows commit together or not at all. The
//! serialized commit section plays the role of the payout row lock, so
//! concurrent workers and duplicate task deliveries converge instead of
//! double-finalizing.
//!
//! Ledger entries are created only inside `finalize_success`. A worker that
//! dies between the provider call and finalization leaves no provisional
//! entries; the next delivery re-calls the provider with the same
//! idempotency key and the provider deduplicates.

use crate::{
    config::Config,
    error::{Error, Result},
    metrics::Metrics,
    provider::{PayoutProvider, ProviderError, ProviderRequest},
    types::PayoutRequest,
};
use chrono::Utc;
use ledger_core::{
    accounts::{ensure_bootstrap_accounts, ChartHandles},
    events::append_event,
    ledger::{post_balanced_transaction, NewTransaction, Posting},
    projector,
    store::Store,
    types::{AggregateType, EventKind, EventRecord, PageCursor, Payout, PayoutStatus, PayoutPage,
        TransactionId},
};
use message_bus::{Message, Publisher, Topic};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Result of an intake call
#[derive(Debug, Clone)]
pub enum IntakeOutcome {
    /// New payout accepted (201 to the caller)
    Created(Payout),

    /// Identical request replayed; the stored payout is returned (200)
    Replayed(Payout),
}

impl IntakeOutcome {
    /// The stored payout either way
    pub fn payout(&self) -> &Payout {
        match self {
            IntakeOutcome::Created(p) | IntakeOutcome::Replayed(p) => p,
        }
    }

    /// True when the request matched an existing payout
    pub fn is_replay(&self) -> bool {
        matches!(self, IntakeOutcome::Replayed(_))
    }
}

/// Exactly-once payout engine over the ledger store
pub struct PayoutEngine {
    store: Arc<Store>,
    chart: ChartHandles,
    provider: Arc<dyn PayoutProvider>,
    publisher: Arc<dyn Publisher<EventRecord>>,
    config: Config,
    metrics: Metrics,
}

impl PayoutEngine {
    /// Create the engine, bootstrapping the chart accounts if absent
    pub fn new(
        store: Arc<Store>,
        provider: Arc<dyn PayoutProvider>,
        publisher: Arc<dyn Publisher<EventRecord>>,
        config: Config,
    ) -> Result<Self> {
        config.validate()?;
        let chart = ensure_bootstrap_accounts(&store, &config.chart)?;

        Ok(Self {
            store,
            chart,
            provider,
            publisher,
            config,
            metrics: Metrics::new(),
        })
    }

    /// Underlying store
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Bootstrap account handles
    pub fn chart(&self) -> ChartHandles {
        self.chart
    }

    /// Engine metrics
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Accept a payout request.
    ///
    /// Idempotent on the key: resubmitting an identical request returns the
    /// stored payout, resubmitting a different payload under the same key is
    /// a conflict and mutates nothing.
    pub async fn intake(&self, request: PayoutRequest) -> Result<IntakeOutcome> {
        let amount = request.validate()?;
        let key = request.idempotency_key.clone();

        let (outcome, events) = self.store.atomically(
            |uow| -> Result<(IntakeOutcome, Vec<EventRecord>)> {
                if let Some(existing) = uow.payout_by_key(&key) {
                    return if request.matches(existing, &amount) {
                        Ok((IntakeOutcome::Replayed(existing.clone()), vec![]))
                    } else {
                        Err(Error::IdempotencyConflict(key.clone()))
                    };
                }

                let now = Utc::now();
                let payout = Payout {
                    id: Uuid::now_v7(),
                    idempotency_key: key.clone(),
                    amount,
                    recipient_account: request.recipient_account.clone(),
                    recipient_name: request.recipient_name.clone(),
                    description: request.description.clone(),
                    metadata: request.metadata.clone(),
                    status: PayoutStatus::Pending,
                    linked_transaction_id: None,
                    external_payout_id: None,
                    error_message: None,
                    retry_count: 0,
                    created_at: now,
                    updated_at: now,
                    processed_at: None,
                };

                let event = append_event(
                    uow,
                    format!("{}:{}", EventKind::PayoutCreated.as_str(), key),
                    AggregateType::Payout,
                    payout.id.to_string(),
                    EventKind::PayoutCreated,
                    payout_payload(&payout),
                )?;

                uow.upsert_payout(payout.clone())?;
                projector::apply_payout_change(uow, &payout)?;

                Ok((IntakeOutcome::Created(payout), vec![event]))
            },
        )?;

        if let IntakeOutcome::Created(payout) = &outcome {
            self.metrics.payouts_created.inc();
            tracing::info!(
                payout_id = %payout.id,
                idempotency_key = %payout.idempotency_key,
                amount = %payout.amount,
                "Payout accepted"
            );
        }
        self.publish_events(events).await;

        Ok(outcome)
    }

    /// Claim a pending payout for processing.
    ///
    /// Already-claimed and terminal payouts are returned unchanged, so
    /// duplicate deliveries of the same work unit are harmless.
    pub async fn claim_for_processing(&self, payout_id: Uuid) -> Result<Payout> {
        let (payout, events) = self.store.atomically(|uow| -> Result<(Payout, Vec<EventRecord>)> {
            let mut payout = uow
                .payout(payout_id)
                .ok_or(Error::PayoutNotFound(payout_id))?
                .clone();

            if payout.status != PayoutStatus::Pending {
                return Ok((payout, vec![]));
            }

            payout.status = PayoutStatus::Processing;
            payout.updated_at = Utc::now();

            let event = append_event(
                uow,
                format!(
                    "{}:{}",
                    EventKind::PayoutProcessingStarted.as_str(),
                    payout.idempotency_key
                ),
                AggregateType::Payout,
                payout.id.to_string(),
                EventKind::PayoutProcessingStarted,
                payout_payload(&payout),
            )?;

            uow.upsert_payout(payout.clone())?;
            projector::apply_payout_change(uow, &payout)?;

            Ok((payout, vec![event]))
        })?;

        self.publish_events(events).await;
        Ok(payout)
    }

    /// Finalize a successful external payout: post the balanced ledger
    /// transaction, link it, and complete the payout, all in one unit.
    pub async fn finalize_success(&self, payout_id: Uuid, external_id: &str) -> Result<Payout> {
        let chart = self.chart;

        let (payout, events) = self.store.atomically(|uow| -> Result<(Payout, Vec<EventRecord>)> {
            let mut payout = uow
                .payout(payout_id)
                .ok_or(Error::PayoutNotFound(payout_id))?
                .clone();

            match payout.status {
                PayoutStatus::Completed => {
                    return if payout.external_payout_id.as_deref() == Some(external_id) {
                        // Duplicate delivery after commit
                        Ok((payout, vec![]))
                    } else {
                        Err(Error::ExternalIdConflict(format!(
                            "payout {} already completed with a different external id",
                            payout.id
                        )))
                    };
                }
                PayoutStatus::Processing => {}
                from => {
                    return Err(Error::IllegalTransition {
                        from,
                        to: PayoutStatus::Completed,
                    });
                }
            }

            let event = append_event(
                uow,
                format!(
                    "{}:{}",
                    EventKind::PayoutCompleted.as_str(),
                    payout.idempotency_key
                ),
                AggregateType::Payout,
                payout.id.to_string(),
                EventKind::PayoutCompleted,
                completed_payload(&payout, external_id),
            )?;

            // Paying out an owed liability against cash: debit the
            // liability account, credit the cash account
            let transaction_id = TransactionId::for_payout(&payout.idempotency_key);
            let posting = post_balanced_transaction(
                uow,
                &NewTransaction {
                    id: transaction_id.clone(),
                    debit_account: chart.payout_liability,
                    debit_amount: payout.amount,
                    credit_account: chart.cash,
                    credit_amount: payout.amount,
                    description: format!("Payout {} settlement", payout.idempotency_key),
                },
            )?;
            if let Posting::Created {
                transaction,
                entries,
            } = &posting
            {
                projector::apply_ledger_entries(uow, transaction, entries, event.sequence)?;
            }

            let now = Utc::now();
            payout.status = PayoutStatus::Completed;
            payout.linked_transaction_id = Some(transaction_id);
            payout.external_payout_id = Some(external_id.to_string());
            payout.updated_at = now;
            payout.processed_at = Some(now);

            uow.upsert_payout(payout.clone())?;
            projector::apply_payout_change(uow, &payout)?;

            Ok((payout, vec![event]))
        })?;

        if !events.is_empty() {
            self.metrics.payouts_completed.inc();
            tracing::info!(
                payout_id = %payout.id,
                external_id,
                transaction_id = ?payout.linked_transaction_id,
                "Payout completed"
            );
        }
        self.publish_events(events).await;

        Ok(payout)
    }

    /// Record a failed external attempt. Retryable failures below the retry
    /// budget leave the payout in `Processing` for redelivery; everything
    /// else is terminal.
    pub async fn finalize_failure(
        &self,
        payout_id: Uuid,
        error_message: &str,
        retryable: bool,
    ) -> Result<Payout> {
        let max_retries = self.config.payout.max_retries;

        let (payout, events) = self.store.atomically(|uow| -> Result<(Payout, Vec<EventRecord>)> {
            let mut payout = uow
                .payout(payout_id)
                .ok_or(Error::PayoutNotFound(payout_id))?
                .clone();

            match payout.status {
                PayoutStatus::Processing => {}
                // Duplicate delivery after the terminal commit
                PayoutStatus::Failed | PayoutStatus::Cancelled => return Ok((payout, vec![])),
                from => {
                    return Err(Error::IllegalTransition {
                        from,
                        to: PayoutStatus::Failed,
                    });
                }
            }

            payout.retry_count += 1;
            payout.error_message = Some(error_message.to_string());
            payout.updated_at = Utc::now();

            let will_retry = retryable && payout.retry_count < max_retries;
            let kind = if will_retry {
                EventKind::PayoutRetryScheduled
            } else {
                payout.status = PayoutStatus::Failed;
                payout.processed_at = Some(payout.updated_at);
                EventKind::PayoutFailed
            };

            let event = append_event(
                uow,
                format!(
                    "payout.failed:{}:{}",
                    payout.idempotency_key, payout.retry_count
                ),
                AggregateType::Payout,
                payout.id.to_string(),
                kind,
                failure_payload(&payout, error_message, retryable),
            )?;

            uow.upsert_payout(payout.clone())?;
            projector::apply_payout_change(uow, &payout)?;

            Ok((payout, vec![event]))
        })?;

        if !events.is_empty() {
            match payout.status {
                PayoutStatus::Failed => {
                    self.metrics.payouts_failed.inc();
                    tracing::warn!(
                        payout_id = %payout.id,
                        retry_count = payout.retry_count,
                        error = error_message,
                        "Payout failed terminally"
                    );
                }
                _ => {
                    self.metrics.payouts_retried.inc();
                    tracing::warn!(
                        payout_id = %payout.id,
                        retry_count = payout.retry_count,
                        error = error_message,
                        "Payout attempt failed, retry scheduled"
                    );
                }
            }
        }
        self.publish_events(events).await;

        Ok(payout)
    }

    /// Cancel a payout. Permitted only while `Pending`.
    pub async fn cancel(&self, payout_id: Uuid) -> Result<Payout> {
        let (payout, events) = self.store.atomically(|uow| -> Result<(Payout, Vec<EventRecord>)> {
            let mut payout = uow
                .payout(payout_id)
                .ok_or(Error::PayoutNotFound(payout_id))?
                .clone();

            if payout.status != PayoutStatus::Pending {
                return Err(Error::IllegalTransition {
                    from: payout.status,
                    to: PayoutStatus::Cancelled,
                });
            }

            payout.status = PayoutStatus::Cancelled;
            payout.updated_at = Utc::now();
            payout.processed_at = Some(payout.updated_at);

            let event = append_event(
                uow,
                format!(
                    "{}:{}",
                    EventKind::PayoutCancelled.as_str(),
                    payout.idempotency_key
                ),
                AggregateType::Payout,
                payout.id.to_string(),
                EventKind::PayoutCancelled,
                payout_payload(&payout),
            )?;

            uow.upsert_payout(payout.clone())?;
            projector::apply_payout_change(uow, &payout)?;

            Ok((payout, vec![event]))
        })?;

        self.publish_events(events).await;
        Ok(payout)
    }

    /// Run one `ProcessPayout` work unit: claim, call the provider under a
    /// deadline, finalize. Idempotent on the payout; safe to deliver any
    /// number of times.
    pub async fn process_payout(&self, payout_id: Uuid) -> Result<Payout> {
        let payout = self.claim_for_processing(payout_id).await?;

        match payout.status {
            PayoutStatus::Processing => {}
            // Terminal: duplicate delivery, nothing to do
            _ => return Ok(payout),
        }

        let request = ProviderRequest {
            idempotency_key: payout.idempotency_key.clone(),
            amount: payout.amount,
            recipient_account: payout.recipient_account.clone(),
            recipient_name: payout.recipient_name.clone(),
        };

        let deadline = std::time::Duration::from_millis(self.config.payout.provider_deadline_ms);
        let started = Instant::now();
        let call_result = match tokio::time::timeout(deadline, self.provider.send_payout(&request))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Transient(format!(
                "provider call exceeded deadline of {:?}",
                deadline
            ))),
        };
        self.metrics
            .provider_call_duration
            .observe(started.elapsed().as_secs_f64());

        match call_result {
            Ok(receipt) => {
                self.metrics
                    .provider_calls
                    .with_label_values(&["success"])
                    .inc();
                self.finalize_success(payout_id, &receipt.external_id).await
            }
            Err(ProviderError::Transient(message)) => {
                self.metrics
                    .provider_calls
                    .with_label_values(&["transient"])
                    .inc();
                let updated = self.finalize_failure(payout_id, &message, true).await?;
                if updated.status == PayoutStatus::Failed {
                    // Retry budget exhausted; terminal
                    Ok(updated)
                } else {
                    // Still processing: surface the failure so the
                    // dispatcher redelivers with backoff
                    Err(Error::ProviderTransient(message))
                }
            }
            Err(ProviderError::Permanent(message)) => {
                self.metrics
                    .provider_calls
                    .with_label_values(&["permanent"])
                    .inc();
                self.finalize_failure(payout_id, &message, false).await
            }
        }
    }

    // Queries

    /// Payout by id
    pub fn get_payout(&self, payout_id: Uuid) -> Result<Payout> {
        self.store
            .get_payout(payout_id)
            .ok_or(Error::PayoutNotFound(payout_id))
    }

    /// Payout by idempotency key
    pub fn get_payout_by_key(&self, key: &str) -> Option<Payout> {
        self.store.get_payout_by_key(key)
    }

    /// Page through payouts in `(created_at, id)` order
    pub fn list_payouts(
        &self,
        status: Option<PayoutStatus>,
        cursor: Option<PageCursor>,
        limit: usize,
    ) -> PayoutPage {
        self.store.list_payouts(status, cursor, limit)
    }

    /// Ordered events with `sequence > since`, the backing query of
    /// `GET /api/events`
    pub fn read_events(&self, since: u64, limit: usize) -> Vec<EventRecord> {
        self.store.read_events(since, limit)
    }

    /// Ordered history of one payout
    pub fn payout_history(&self, payout_id: Uuid) -> Vec<EventRecord> {
        self.store
            .read_aggregate_history(AggregateType::Payout, &payout_id.to_string())
    }

    /// Fan out committed events, best effort
    async fn publish_events(&self, events: Vec<EventRecord>) {
        for event in events {
            let topic = Topic::new(event.aggregate_type.as_str());
            self.publisher.publish(&topic, Message::new(event)).await;
        }
    }
}

fn payout_payload(payout: &Payout) -> HashMap<String, serde_json::Value> {
    HashMap::from([
        ("payout_id".to_string(), json!(payout.id)),
        (
            "idempotency_key".to_string(),
            json!(payout.idempotency_key),
        ),
        (
            "amount".to_string(),
            json!(payout.amount.value().to_string()),
        ),
        (
            "currency".to_string(),
            json!(payout.amount.currency().code()),
        ),
        (
            "recipient_account".to_string(),
            json!(payout.recipient_account),
        ),
        ("status".to_string(), json!(payout.status.as_str())),
    ])
}

fn completed_payload(payout: &Payout, external_id: &str) -> HashMap<String, serde_json::Value> {
    let mut payload = payout_payload(payout);
    payload.insert("external_payout_id".to_string(), json!(external_id));
    payload.insert(
        "ledger_transaction_id".to_string(),
        json!(TransactionId::for_payout(&payout.idempotency_key).as_str()),
    );
    payload
}

fn failure_payload(
    payout: &Payout,
    error_message: &str,
    retryable: bool,
) -> HashMap<String, serde_json::Value> {
    let mut payload = payout_payload(payout);
    payload.insert("error".to_string(), json!(error_message));
    payload.insert("retry_count".to_string(), json!(payout.retry_count));
    payload.insert("retryable".to_string(), json!(retryable));
    payload
}
