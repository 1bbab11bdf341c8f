//! Tenant-scoped SELECT builder.
//!
//! Every read against a tenant-owned table goes through this builder, and
//! [`TenantScopedSelect::build`] refuses to render SQL until a tenant has
//! been bound. The tenant predicate is always `tenant_id = $1`, so callers
//! number their own placeholders from `$2`.

use uuid::Uuid;

use super::error::StoreError;

/// Builder for a SELECT that must carry a tenant predicate.
#[derive(Debug, Clone)]
pub struct TenantScopedSelect {
    table: &'static str,
    columns: String,
    tenant: Option<Uuid>,
    predicates: Vec<String>,
    order_by: Option<String>,
    limit_placeholder: Option<String>,
}

impl TenantScopedSelect {
    /// Starts a SELECT of `columns` from `table`.
    pub fn new(table: &'static str, columns: &str) -> Self {
        Self {
            table,
            columns: columns.to_string(),
            tenant: None,
            predicates: Vec::new(),
            order_by: None,
            limit_placeholder: None,
        }
    }

    /// Binds the tenant whose rows the query may see.
    pub fn for_tenant(mut self, tenant_id: Uuid) -> Self {
        self.tenant = Some(tenant_id);
        self
    }

    /// Adds a predicate. Placeholders start at `$2`.
    pub fn and_where(mut self, clause: &str) -> Self {
        self.predicates.push(clause.to_string());
        self
    }

    /// Sets the ORDER BY expression.
    pub fn order_by(mut self, expr: &str) -> Self {
        self.order_by = Some(expr.to_string());
        self
    }

    /// Sets a LIMIT placeholder (e.g. `$4`).
    pub fn limit(mut self, placeholder: &str) -> Self {
        self.limit_placeholder = Some(placeholder.to_string());
        self
    }

    /// Renders the SQL and returns it with the bound tenant.
    ///
    /// Fails when no tenant was bound; there is no way to produce a
    /// cross-tenant read from this builder.
    pub fn build(self) -> Result<(String, Uuid), StoreError> {
        let tenant = self.tenant.ok_or(StoreError::MissingTenantScope {
            table: self.table,
        })?;

        let mut sql = format!(
            "SELECT {} FROM {} WHERE tenant_id = $1",
            self.columns, self.table
        );
        for predicate in &self.predicates {
            sql.push_str(" AND ");
            sql.push_str(predicate);
        }
        if let Some(order) = &self.order_by {
            sql.push_str(" ORDER BY ");
            sql.push_str(order);
        }
        if let Some(limit) = &self.limit_placeholder {
            sql.push_str(" LIMIT ");
            sql.push_str(limit);
        }

        Ok((sql, tenant))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_without_tenant_is_refused() {
        let err = TenantScopedSelect::new("faces", "id")
            .and_where("external_id = $2")
            .build()
            .unwrap_err();

        assert!(matches!(
            err,
            StoreError::MissingTenantScope { table: "faces" }
        ));
    }

    #[test]
    fn build_renders_tenant_predicate_first() {
        let tenant = Uuid::new_v4();
        let (sql, bound) = TenantScopedSelect::new("faces", "id, external_id")
            .for_tenant(tenant)
            .and_where("external_id = $2")
            .order_by("id::text ASC")
            .limit("$3")
            .build()
            .unwrap();

        assert_eq!(
            sql,
            "SELECT id, external_id FROM faces WHERE tenant_id = $1 \
             AND external_id = $2 ORDER BY id::text ASC LIMIT $3"
        );
        assert_eq!(bound, tenant);
    }

    #[test]
    fn build_minimal_query() {
        let tenant = Uuid::new_v4();
        let (sql, _) = TenantScopedSelect::new("faces", "COUNT(*)")
            .for_tenant(tenant)
            .build()
            .unwrap();

        assert_eq!(sql, "SELECT COUNT(*) FROM faces WHERE tenant_id = $1");
    }
}
