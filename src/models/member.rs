use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShopRole {
    Owner,
    Manager,
    Technician,
}

impl ShopRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShopRole::Owner => "owner",
            ShopRole::Manager => "manager",
            ShopRole::Technician => "technician",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopMember {
    pub id: Uuid,
    pub shop_id: Uuid,
    pub user_id: Uuid,
    pub role: ShopRole,
    #[serde(default)]
    pub department_id: Option<Uuid>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Department {
    pub id: Uuid,
    pub shop_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub pto_accrual_rate: f64,
    #[serde(default)]
    pub sort_order: i32,
}

/// Input for `create_department`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDepartment {
    pub name: String,
    #[serde(default)]
    pub pto_accrual_rate: Option<f64>,
    #[serde(default)]
    pub sort_order: Option<i32>,
}

/// Partial update for a department
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DepartmentUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pto_accrual_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<i32>,
}
