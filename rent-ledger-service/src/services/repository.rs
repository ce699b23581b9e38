//! MongoDB-backed payment record store.
//!
//! Multi-record writes run inside a client-session transaction, so the
//! deployment must be a replica set.

use crate::error::LedgerError;
use crate::models::{PaymentRecord, PaymentStatus, Settlement};
use crate::services::store::{OrderClaim, PaymentStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::{doc, to_bson, Bson, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{
    FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument,
};
use mongodb::{Client, ClientSession, Collection, Database, IndexModel};
use std::collections::BTreeSet;

const COLLECTION: &str = "payment_records";
const DUPLICATE_KEY: i32 = 11000;

#[derive(Clone)]
pub struct MongoPaymentStore {
    client: Client,
    db: Database,
    records: Collection<PaymentRecord>,
}

impl MongoPaymentStore {
    pub fn new(client: &Client, db_name: &str) -> Self {
        let db = client.database(db_name);
        Self {
            client: client.clone(),
            records: db.collection(COLLECTION),
            db,
        }
    }

    /// Initialize the ledger's indexes.
    pub async fn init_indexes(&self) -> Result<(), LedgerError> {
        // One record per tenant, property and month
        let month_index = IndexModel::builder()
            .keys(doc! { "tenant_id": 1, "property_id": 1, "lease_month": 1 })
            .options(
                IndexOptions::builder()
                    .name("tenant_property_month_idx".to_string())
                    .unique(true)
                    .build(),
            )
            .build();

        let owner_index = IndexModel::builder()
            .keys(doc! { "owner_id": 1, "status": 1 })
            .options(
                IndexOptions::builder()
                    .name("owner_status_idx".to_string())
                    .build(),
            )
            .build();

        let tenant_index = IndexModel::builder()
            .keys(doc! { "tenant_id": 1, "lease_month": 1 })
            .options(
                IndexOptions::builder()
                    .name("tenant_month_idx".to_string())
                    .build(),
            )
            .build();

        let order_index = IndexModel::builder()
            .keys(doc! { "external_order_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("external_order_idx".to_string())
                    .build(),
            )
            .build();

        self.records
            .create_indexes([month_index, owner_index, tenant_index, order_index], None)
            .await?;

        tracing::info!("Rent ledger indexes initialized");
        Ok(())
    }

    async fn start_transaction(&self) -> Result<ClientSession, LedgerError> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;
        Ok(session)
    }

    async fn find_many(
        &self,
        filter: Document,
        sort: Document,
    ) -> Result<Vec<PaymentRecord>, LedgerError> {
        let options = FindOptions::builder().sort(sort).build();
        let cursor = self.records.find(filter, Some(options)).await?;
        Ok(cursor.try_collect().await?)
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY,
        ErrorKind::BulkWrite(failure) => failure
            .write_errors
            .as_ref()
            .is_some_and(|errors| errors.iter().any(|e| e.code == DUPLICATE_KEY)),
        _ => false,
    }
}

fn bson<T: serde::Serialize>(value: &T) -> Result<Bson, LedgerError> {
    to_bson(value).map_err(|e| LedgerError::Storage(e.into()))
}

fn settlement_fields(settlement: &Settlement) -> Result<Document, LedgerError> {
    let mut fields = doc! {
        "status": bson(&PaymentStatus::Paid)?,
        "payment_date": bson(&settlement.paid_at)?,
        "payment_method": bson(&settlement.method)?,
        "updated_at": bson(&settlement.paid_at)?,
    };
    if let Some(transaction_id) = &settlement.transaction_id {
        fields.insert("external_transaction_id", transaction_id.as_str());
    }
    if let Some(signature) = &settlement.signature {
        fields.insert("external_signature", signature.as_str());
    }
    if let Some(note) = &settlement.note {
        fields.insert("notes", note.as_str());
    }
    Ok(fields)
}

#[async_trait]
impl PaymentStore for MongoPaymentStore {
    async fn insert_schedule(&self, records: &[PaymentRecord]) -> Result<(), LedgerError> {
        if records.is_empty() {
            return Ok(());
        }

        let pairs: BTreeSet<(&str, &str)> = records
            .iter()
            .map(|r| (r.tenant_id.as_str(), r.property_id.as_str()))
            .collect();

        let mut session = self.start_transaction().await?;

        for (tenant_id, property_id) in &pairs {
            let existing = self
                .records
                .count_documents_with_session(
                    doc! { "tenant_id": *tenant_id, "property_id": *property_id },
                    None,
                    &mut session,
                )
                .await?;
            if existing > 0 {
                session.abort_transaction().await?;
                return Err(LedgerError::DuplicateSchedule {
                    tenant_id: tenant_id.to_string(),
                    property_id: property_id.to_string(),
                });
            }
        }

        let inserted = self
            .records
            .insert_many_with_session(records, None, &mut session)
            .await;
        if let Err(e) = inserted {
            if is_duplicate_key(&e) {
                return Err(LedgerError::DuplicateSchedule {
                    tenant_id: records[0].tenant_id.clone(),
                    property_id: records[0].property_id.clone(),
                });
            }
            return Err(e.into());
        }

        session.commit_transaction().await?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<PaymentRecord>, LedgerError> {
        Ok(self.records.find_one(doc! { "_id": id }, None).await?)
    }

    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<PaymentRecord>, LedgerError> {
        self.find_many(doc! { "_id": { "$in": ids.to_vec() } }, doc! { "lease_month": 1 })
            .await
    }

    async fn find_by_order(&self, order_id: &str) -> Result<Vec<PaymentRecord>, LedgerError> {
        self.find_many(
            doc! { "external_order_id": order_id },
            doc! { "lease_month": 1 },
        )
        .await
    }

    async fn list_for_tenant(&self, tenant_id: &str) -> Result<Vec<PaymentRecord>, LedgerError> {
        self.find_many(doc! { "tenant_id": tenant_id }, doc! { "lease_month": 1 })
            .await
    }

    async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<PaymentRecord>, LedgerError> {
        self.find_many(doc! { "owner_id": owner_id }, doc! { "lease_month": -1 })
            .await
    }

    async fn stamp_order(
        &self,
        claims: &[OrderClaim],
        order_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        let stamped_at = bson(&now)?;
        let mut session = self.start_transaction().await?;

        for claim in claims {
            let filter = doc! {
                "_id": claim.record_id.as_str(),
                "status": bson(&PaymentStatus::Pending)?,
                "external_order_id": bson(&claim.expected_order_id)?,
            };
            let mut update = doc! {
                "$set": {
                    "external_order_id": order_id,
                    "order_stamped_at": stamped_at.clone(),
                    "updated_at": stamped_at.clone(),
                }
            };
            if let Some(previous) = claim
                .expected_order_id
                .as_deref()
                .filter(|previous| *previous != order_id)
            {
                update.insert("$push", doc! { "superseded_order_ids": previous });
            }

            let result = self
                .records
                .update_one_with_session(filter, update, None, &mut session)
                .await?;
            if result.matched_count != 1 {
                session.abort_transaction().await?;
                return Err(LedgerError::OrderInProgress(
                    claim.expected_order_id.clone().unwrap_or_default(),
                ));
            }
        }

        session.commit_transaction().await?;
        Ok(())
    }

    async fn settle_order(
        &self,
        order_id: &str,
        settlement: &Settlement,
    ) -> Result<Vec<PaymentRecord>, LedgerError> {
        let mut session = self.start_transaction().await?;

        self.records
            .update_many_with_session(
                doc! {
                    "external_order_id": order_id,
                    "status": bson(&PaymentStatus::Pending)?,
                },
                doc! { "$set": settlement_fields(settlement)? },
                None,
                &mut session,
            )
            .await?;

        let options = FindOptions::builder().sort(doc! { "lease_month": 1 }).build();
        let mut cursor = self
            .records
            .find_with_session(
                doc! { "external_order_id": order_id },
                Some(options),
                &mut session,
            )
            .await?;
        let records: Vec<PaymentRecord> = cursor.stream(&mut session).try_collect().await?;

        if records.is_empty() {
            session.abort_transaction().await?;
            return Err(LedgerError::OrderNotFound(order_id.to_string()));
        }

        session.commit_transaction().await?;
        Ok(records)
    }

    async fn settle_record(
        &self,
        claim: &OrderClaim,
        settlement: &Settlement,
    ) -> Result<PaymentRecord, LedgerError> {
        let record_id = claim.record_id.as_str();
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        let filter = doc! {
            "_id": record_id,
            "status": bson(&PaymentStatus::Pending)?,
            "external_order_id": bson(&claim.expected_order_id)?,
        };
        let mut fields = settlement_fields(settlement)?;
        let mut update = doc! {};
        if let Some(previous) = claim.expected_order_id.as_deref() {
            fields.insert("external_order_id", Bson::Null);
            fields.insert("order_stamped_at", Bson::Null);
            update.insert("$push", doc! { "superseded_order_ids": previous });
        }
        update.insert("$set", fields);

        let updated = self
            .records
            .find_one_and_update(filter, update, Some(options))
            .await?;

        match updated {
            Some(record) => Ok(record),
            None => match self.find_by_id(record_id).await? {
                Some(current) if current.is_paid() => {
                    Err(LedgerError::AlreadySettled(record_id.to_string()))
                }
                Some(current) => Err(LedgerError::OrderInProgress(
                    current.external_order_id.unwrap_or_default(),
                )),
                None => Err(LedgerError::RecordNotFound(record_id.to_string())),
            },
        }
    }

    async fn ping(&self) -> Result<(), LedgerError> {
        self.db.run_command(doc! { "ping": 1 }, None).await?;
        Ok(())
    }
}
