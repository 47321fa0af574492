use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "discounts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: Uuid,
    pub title: String,
    /// "percentage" or "fixed"; see [`crate::pricing::DiscountKind`].
    pub kind: String,
    pub value: i64,
    /// Scope: true applies to every product, false restricts to the ids in
    /// `discount_products`.
    pub apply_all: bool,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::discount_products::Entity")]
    DiscountProducts,
}

impl Related<super::discount_products::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DiscountProducts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
