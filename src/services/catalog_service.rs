use sea_orm::{
    ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use uuid::Uuid;

use crate::{
    db::OrmConn,
    dto::products::ProductList,
    entity::{
        currency_rates::Entity as CurrencyRates,
        discount_products::{Column as DiscountProductCol, Entity as DiscountProducts},
        discounts::{Column as DiscountCol, Entity as Discounts, Model as DiscountModel},
        products::{Column as ProductCol, Entity as Products, Model as ProductModel},
    },
    error::{AppError, AppResult},
    models::PricedProduct,
    pricing::{self, DiscountKind, DiscountTerms},
    response::{ApiResponse, Meta},
    routes::params::{ProductQuery, ProductSortBy, SortOrder},
    state::AppState,
};

pub const BASE_CURRENCY: &str = "USD";

pub fn normalize_currency(currency: Option<String>) -> String {
    currency
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| BASE_CURRENCY.to_string())
        .to_uppercase()
}

/// Exchange rate for `currency` relative to the base currency. The rates
/// table is maintained by an external job; an unknown code is a caller error.
pub async fn currency_rate(orm: &OrmConn, currency: &str) -> AppResult<f64> {
    if currency == BASE_CURRENCY {
        return Ok(1.0);
    }
    let rate = CurrencyRates::find_by_id(currency.to_string())
        .one(orm)
        .await?
        .ok_or_else(|| AppError::BadRequest(format!("Unsupported currency {currency}")))?;
    Ok(rate.rate)
}

/// Every discount whose scope includes this product: "all products"
/// discounts plus those listing the product explicitly. Scopes are disjoint
/// per discount, so the union has no duplicates.
async fn applicable_discounts(orm: &OrmConn, product_id: Uuid) -> AppResult<Vec<DiscountModel>> {
    let mut discounts = Discounts::find()
        .filter(DiscountCol::ApplyAll.eq(true))
        .all(orm)
        .await?;

    let scoped_ids: Vec<Uuid> = DiscountProducts::find()
        .filter(DiscountProductCol::ProductId.eq(product_id))
        .all(orm)
        .await?
        .into_iter()
        .map(|row| row.discount_id)
        .collect();

    if !scoped_ids.is_empty() {
        let scoped = Discounts::find()
            .filter(DiscountCol::Id.is_in(scoped_ids))
            .all(orm)
            .await?;
        discounts.extend(scoped);
    }

    Ok(discounts)
}

/// Resolve a product's live price: base price folded through the applicable
/// discounts, then converted into the requested currency.
pub async fn get_priced(
    orm: &OrmConn,
    product_id: Uuid,
    currency: &str,
) -> AppResult<PricedProduct> {
    let product = Products::find_by_id(product_id)
        .one(orm)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;
    priced_from_model(orm, product, currency).await
}

async fn priced_from_model(
    orm: &OrmConn,
    product: ProductModel,
    currency: &str,
) -> AppResult<PricedProduct> {
    let discounts = applicable_discounts(orm, product.id).await?;
    let terms: Vec<DiscountTerms> = discounts
        .iter()
        .filter_map(|d| {
            DiscountKind::parse(&d.kind).map(|kind| DiscountTerms {
                kind,
                value: d.value,
            })
        })
        .collect();

    let adjusted = pricing::apply_discounts(product.price, &terms);
    let rate = currency_rate(orm, currency).await?;

    Ok(PricedProduct {
        id: product.id,
        title: product.title,
        description: product.description,
        price: pricing::convert_amount(adjusted.price, rate),
        old_price: adjusted.old_price.map(|p| pricing::convert_amount(p, rate)),
        currency: currency.to_string(),
    })
}

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let currency = normalize_currency(query.currency);
    let mut condition = Condition::all();

    if let Some(search) = query.q.as_ref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(ProductCol::Title).ilike(pattern.clone()))
                .add(Expr::col(ProductCol::Description).ilike(pattern)),
        );
    }

    if let Some(min_price) = query.min_price {
        condition = condition.add(ProductCol::Price.gte(min_price));
    }

    if let Some(max_price) = query.max_price {
        condition = condition.add(ProductCol::Price.lte(max_price));
    }

    let sort_by = query.sort_by.unwrap_or(ProductSortBy::CreatedAt);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let sort_col = match sort_by {
        ProductSortBy::CreatedAt => ProductCol::CreatedAt,
        ProductSortBy::Price => ProductCol::Price,
        ProductSortBy::Title => ProductCol::Title,
    };

    let mut finder = Products::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let models = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let mut items = Vec::with_capacity(models.len());
    for model in models {
        items.push(priced_from_model(&state.orm, model, &currency).await?);
    }

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Products", ProductList { items }, Some(meta)))
}

pub async fn get_product(
    state: &AppState,
    id: Uuid,
    currency: Option<String>,
) -> AppResult<ApiResponse<PricedProduct>> {
    let currency = normalize_currency(currency);
    let product = get_priced(&state.orm, id, &currency).await?;
    Ok(ApiResponse::success("OK", product, Some(Meta::empty())))
}
