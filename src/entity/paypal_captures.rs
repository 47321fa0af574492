use sea_orm::entity::prelude::*;

/// Captured-items record, one row per gateway order. The primary key makes
/// the capture write idempotent under client retries.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "paypal_captures")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub paypal_order_id: String,
    pub order_id: Uuid,
    pub amount: Option<i64>,
    pub items: Option<Json>,
    pub captured_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::orders::Entity",
        from = "Column::OrderId",
        to = "super::orders::Column::Id"
    )]
    Orders,
}

impl Related<super::orders::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
