use crate::models::schema::email_templates;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum EmailTemplateError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] diesel::result::Error),
}

/// A tenant-defined email template. Built-in defaults live in code
/// (`email::template`) and apply when no row matches a name.
#[derive(Queryable, Identifiable, Serialize, Deserialize, Clone, Debug)]
#[diesel(table_name = email_templates)]
#[diesel(primary_key(tenant_id, name))]
pub struct EmailTemplate {
    pub tenant_id: Uuid,
    pub name: String,
    pub subject: String,
    pub body: String,
    pub html: String,
    pub updated_at: DateTime<Utc>,
}

impl EmailTemplate {
    pub fn get_by_name(
        conn: &mut PgConnection,
        lookup_tenant_id: Uuid,
        lookup_name: &str,
    ) -> Result<Option<EmailTemplate>, EmailTemplateError> {
        email_templates::table
            .filter(email_templates::tenant_id.eq(lookup_tenant_id))
            .filter(email_templates::name.eq(lookup_name))
            .first::<EmailTemplate>(conn)
            .optional()
            .map_err(EmailTemplateError::DatabaseError)
    }

    pub fn list(
        conn: &mut PgConnection,
        lookup_tenant_id: Uuid,
    ) -> Result<Vec<EmailTemplate>, EmailTemplateError> {
        email_templates::table
            .filter(email_templates::tenant_id.eq(lookup_tenant_id))
            .order(email_templates::name.asc())
            .load::<EmailTemplate>(conn)
            .map_err(EmailTemplateError::DatabaseError)
    }

    pub fn delete(
        conn: &mut PgConnection,
        lookup_tenant_id: Uuid,
        lookup_name: &str,
    ) -> Result<(), EmailTemplateError> {
        diesel::delete(
            email_templates::table
                .filter(email_templates::tenant_id.eq(lookup_tenant_id))
                .filter(email_templates::name.eq(lookup_name)),
        )
        .execute(conn)
        .map(|_| ())
        .map_err(EmailTemplateError::DatabaseError)
    }
}

#[derive(Insertable)]
#[diesel(table_name = email_templates)]
pub struct NewEmailTemplate {
    pub tenant_id: Uuid,
    pub name: String,
    pub subject: String,
    pub body: String,
    pub html: String,
}

impl NewEmailTemplate {
    pub fn upsert(&self, conn: &mut PgConnection) -> Result<EmailTemplate, EmailTemplateError> {
        diesel::insert_into(email_templates::table)
            .values(self)
            .on_conflict((email_templates::tenant_id, email_templates::name))
            .do_update()
            .set((
                email_templates::subject.eq(self.subject.clone()),
                email_templates::body.eq(self.body.clone()),
                email_templates::html.eq(self.html.clone()),
                email_templates::updated_at.eq(diesel::dsl::now),
            ))
            .get_result::<EmailTemplate>(conn)
            .map_err(EmailTemplateError::DatabaseError)
    }
}
