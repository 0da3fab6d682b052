use sea_orm::{
    ColumnTrait, Condition, EntityTrait, JoinType, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, RelationTrait,
    sea_query::{Expr, extension::postgres::PgExpr},
};

use crate::{
    dto::catalog::{CategoryDetail, CategoryList, HomePage, ProductDetail, ProductList},
    entity::{
        categories::{Column as CategoryCol, Entity as Categories},
        products::{self, Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    models::{Category, Product},
    response::{ApiResponse, Meta},
    routes::params::{Pagination, ProductQuery, ProductSort, like_pattern},
    state::AppState,
};

const FEATURED_LIMIT: u64 = 6;
const LATEST_LIMIT: u64 = 8;
const RELATED_LIMIT: u64 = 4;
const CATALOG_PAGE_SIZE: i64 = 12;

pub async fn home(state: &AppState) -> AppResult<ApiResponse<HomePage>> {
    let featured_products = Products::find()
        .filter(ProdCol::Available.eq(true))
        .filter(ProdCol::Featured.eq(true))
        .order_by_desc(ProdCol::CreatedAt)
        .limit(FEATURED_LIMIT)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    let latest_products = Products::find()
        .filter(ProdCol::Available.eq(true))
        .order_by_desc(ProdCol::CreatedAt)
        .limit(LATEST_LIMIT)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    let categories = all_categories(state).await?;

    Ok(ApiResponse::success(
        "Home",
        HomePage {
            featured_products,
            latest_products,
            categories,
        },
        None,
    ))
}

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination().normalize_with(CATALOG_PAGE_SIZE);
    let mut condition = Condition::all().add(ProdCol::Available.eq(true));

    if let Some(search) = query.q.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = like_pattern(search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col((Products, ProdCol::Name)).ilike(pattern.clone()))
                .add(Expr::col((Products, ProdCol::Description)).ilike(pattern.clone()))
                .add(Expr::col((Categories, CategoryCol::Name)).ilike(pattern)),
        );
    }

    if let Some(slug) = query.category.as_deref().filter(|s| !s.is_empty()) {
        condition = condition.add(CategoryCol::Slug.eq(slug));
    }

    if let Some(min_price) = query.min_price {
        condition = condition.add(ProdCol::Price.gte(min_price));
    }

    if let Some(max_price) = query.max_price {
        condition = condition.add(ProdCol::Price.lte(max_price));
    }

    let mut finder = Products::find()
        .join(JoinType::InnerJoin, products::Relation::Categories.def())
        .filter(condition);
    finder = match query.sort.unwrap_or_default() {
        ProductSort::PriceLow => finder.order_by_asc(ProdCol::Price),
        ProductSort::PriceHigh => finder.order_by_desc(ProdCol::Price),
        ProductSort::Name => finder.order_by_asc(ProdCol::Name),
        ProductSort::Newest => finder.order_by_desc(ProdCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Products", ProductList { items }, Some(meta)))
}

pub async fn get_product(state: &AppState, slug: &str) -> AppResult<ApiResponse<ProductDetail>> {
    let product = Products::find()
        .filter(ProdCol::Slug.eq(slug))
        .filter(ProdCol::Available.eq(true))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let category = Categories::find_by_id(product.category_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let related_products = Products::find()
        .filter(ProdCol::CategoryId.eq(product.category_id))
        .filter(ProdCol::Available.eq(true))
        .filter(ProdCol::Id.ne(product.id))
        .order_by_desc(ProdCol::CreatedAt)
        .limit(RELATED_LIMIT)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    Ok(ApiResponse::success(
        "Product",
        ProductDetail {
            product: Product::from(product),
            category: Category::from(category),
            related_products,
        },
        None,
    ))
}

pub async fn list_categories(state: &AppState) -> AppResult<ApiResponse<CategoryList>> {
    let items = all_categories(state).await?;
    Ok(ApiResponse::success("Categories", CategoryList { items }, None))
}

pub async fn get_category(
    state: &AppState,
    slug: &str,
    pagination: Pagination,
) -> AppResult<ApiResponse<CategoryDetail>> {
    let (page, limit, offset) = pagination.normalize_with(CATALOG_PAGE_SIZE);
    let category = Categories::find()
        .filter(CategoryCol::Slug.eq(slug))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let finder = Products::find()
        .filter(ProdCol::CategoryId.eq(category.id))
        .filter(ProdCol::Available.eq(true))
        .order_by_desc(ProdCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;
    let products = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    Ok(ApiResponse::success(
        "Category",
        CategoryDetail {
            category: Category::from(category),
            products,
        },
        Some(Meta::new(page, limit, total)),
    ))
}

async fn all_categories(state: &AppState) -> AppResult<Vec<Category>> {
    Ok(Categories::find()
        .order_by_asc(CategoryCol::Name)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Category::from)
        .collect())
}
