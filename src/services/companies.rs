use crate::{
    db::DbPool,
    entities::company::{self, ActiveModel as CompanyActiveModel, Entity as CompanyEntity, Model as CompanyModel},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateCompanyRequest {
    /// Order-code prefix; uppercase alphanumerics, e.g. "ABC".
    #[validate(
        length(min = 2, max = 5, message = "Company code must be 2 to 5 characters"),
        custom = "validate_company_code"
    )]
    pub code: String,

    #[validate(length(min = 1, max = 100, message = "Company name is required"))]
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CompanyResponse {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

fn validate_company_code(code: &str) -> Result<(), ValidationError> {
    if code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ValidationError::new("company_code_charset"))
    }
}

/// Minimal company master data: the numbering core only needs to resolve
/// a company id to its code prefix.
#[derive(Clone)]
pub struct CompanyService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl CompanyService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    #[instrument(skip(self, request), fields(code = %request.code))]
    pub async fn create_company(
        &self,
        request: CreateCompanyRequest,
    ) -> Result<CompanyResponse, ServiceError> {
        request.validate()?;

        let db = &*self.db_pool;
        let company_id = Uuid::new_v4();

        let existing = CompanyEntity::find()
            .filter(company::Column::Code.eq(request.code.clone()))
            .one(db)
            .await?;
        if existing.is_some() {
            warn!(code = %request.code, "Company code already in use");
            return Err(ServiceError::ValidationError(format!(
                "company code {} is already in use",
                request.code
            )));
        }

        let company_active_model = CompanyActiveModel {
            id: Set(company_id),
            code: Set(request.code.clone()),
            name: Set(request.name),
            ..Default::default()
        };

        let company_model = company_active_model.insert(db).await.map_err(|e| {
            error!(error = %e, code = %request.code, "Failed to create company");
            ServiceError::DatabaseError(e)
        })?;

        info!(company_id = %company_id, code = %request.code, "Company created successfully");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(Event::CompanyCreated(company_id)).await {
                warn!(error = %e, company_id = %company_id, "Failed to send company created event");
            }
        }

        Ok(model_to_response(company_model))
    }

    #[instrument(skip(self), fields(company_id = %company_id))]
    pub async fn get_company(
        &self,
        company_id: Uuid,
    ) -> Result<Option<CompanyResponse>, ServiceError> {
        let db = &*self.db_pool;

        let company = CompanyEntity::find_by_id(company_id).one(db).await?;

        Ok(company.map(model_to_response))
    }
}

fn model_to_response(model: CompanyModel) -> CompanyResponse {
    CompanyResponse {
        id: model.id,
        code: model.code,
        name: model.name,
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn company_code_charset_is_enforced() {
        let ok = CreateCompanyRequest {
            code: "AB1".to_string(),
            name: "Acme".to_string(),
        };
        assert!(ok.validate().is_ok());

        let lowercase = CreateCompanyRequest {
            code: "abc".to_string(),
            name: "Acme".to_string(),
        };
        assert!(lowercase.validate().is_err());

        let too_short = CreateCompanyRequest {
            code: "A".to_string(),
            name: "Acme".to_string(),
        };
        assert!(too_short.validate().is_err());
    }
}
