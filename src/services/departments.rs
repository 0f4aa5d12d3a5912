use serde_json::json;
use shopshift_client::{Query, SortOrder};
use uuid::Uuid;

use crate::cache::{CacheKey, CacheScope};
use crate::error::{Error, Result};
use crate::models::{first_row, from_rows, tables, Department, DepartmentUpdate, NewDepartment};
use crate::Scheduler;

pub struct DepartmentService<'a> {
    scheduler: &'a Scheduler,
}

impl<'a> DepartmentService<'a> {
    pub(crate) fn new(scheduler: &'a Scheduler) -> Self {
        Self { scheduler }
    }

    pub async fn list_departments(&self, shop_id: Uuid) -> Result<Vec<Department>> {
        let rows = self
            .scheduler
            .store()
            .select(
                tables::DEPARTMENTS,
                &Query::new()
                    .eq("shop_id", shop_id)
                    .order("sort_order", SortOrder::Ascending)
                    .order("name", SortOrder::Ascending),
            )
            .await?;
        from_rows(rows)
    }

    /// Create a department; the accrual rate defaults to zero
    pub async fn create_department(&self, shop_id: Uuid, input: NewDepartment) -> Result<Department> {
        self.scheduler.require_user().await?;
        let name = input.name.trim();
        if name.is_empty() {
            return Err(Error::validation("Department name is required"));
        }

        let mut row = json!({
            "shop_id": shop_id,
            "name": name,
            "pto_accrual_rate": input.pto_accrual_rate.unwrap_or(0.0),
        });
        if let Some(sort_order) = input.sort_order {
            row["sort_order"] = json!(sort_order);
        }

        let rows = self
            .scheduler
            .store()
            .insert(tables::DEPARTMENTS, row)
            .await?;
        self.scheduler
            .invalidate(CacheKey::shop(CacheScope::Departments, shop_id));
        first_row(rows)?.ok_or_else(|| Error::store("Department insert returned no row"))
    }

    pub async fn update_department(&self, id: Uuid, update: DepartmentUpdate) -> Result<Department> {
        self.scheduler.require_user().await?;
        if update == DepartmentUpdate::default() {
            return Err(Error::validation("Nothing to update"));
        }
        let rows = self
            .scheduler
            .store()
            .update(
                tables::DEPARTMENTS,
                &Query::new().eq("id", id),
                serde_json::to_value(&update)?,
            )
            .await?;
        let department: Department =
            first_row(rows)?.ok_or_else(|| Error::not_found("Department not found"))?;
        self.scheduler
            .invalidate(CacheKey::shop(CacheScope::Departments, department.shop_id));
        Ok(department)
    }

    pub async fn delete_department(&self, id: Uuid) -> Result<()> {
        self.scheduler.require_user().await?;
        self.scheduler
            .store()
            .delete(tables::DEPARTMENTS, &Query::new().eq("id", id))
            .await?;
        self.scheduler
            .invalidate(CacheKey::scope(CacheScope::Departments));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shopshift_client::{AuthUser, MemoryStore, StaticIdentity};
    use std::sync::Arc;

    #[tokio::test]
    async fn create_defaults_accrual_and_update_patches() {
        let store = MemoryStore::new();
        let scheduler = Scheduler::from_parts(
            Arc::new(store.clone()),
            Arc::new(StaticIdentity::signed_in(AuthUser::new(Uuid::new_v4()))),
        );
        let departments = scheduler.departments();

        let created = departments
            .create_department(
                Uuid::new_v4(),
                NewDepartment {
                    name: "Service".to_string(),
                    pto_accrual_rate: None,
                    sort_order: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(created.pto_accrual_rate, 0.0);

        let updated = departments
            .update_department(
                created.id,
                DepartmentUpdate {
                    pto_accrual_rate: Some(0.05),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Service");
        assert_eq!(updated.pto_accrual_rate, 0.05);

        departments.delete_department(created.id).await.unwrap();
        assert!(store.rows(tables::DEPARTMENTS).is_empty());
    }
}
