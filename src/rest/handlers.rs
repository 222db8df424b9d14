use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::{
    catalog::{Catalog, CatalogError, CatalogResult, ProductPatch},
    storage::{
        traits::{AttributeId, CategoryId, ProductId},
        Storage,
    },
};

use super::{
    models::{
        AttributeResponse, CategoryResponse, CreateProductRequest, CreatedResponse,
        ErrorResponse, HealthResponse, MessageResponse, NameRequest, ProductResponse,
        UpdateProductRequest,
    },
    AppState,
};

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: &'static str,
    message: String,
}

impl ApiError {
    fn malformed(rejection: JsonRejection) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: "MalformedInput",
            message: rejection.body_text(),
        }
    }

    /// Path ids that do not parse as an integer name no resource at all.
    fn unknown_path(rejection: PathRejection) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            error: "NotFound",
            message: rejection.body_text(),
        }
    }

    fn internal() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: "Internal",
            message: "internal error".to_string(),
        }
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        let status = match &err {
            CatalogError::DuplicateName(_) => StatusCode::CONFLICT,
            CatalogError::InvalidCategory(_) | CatalogError::MalformedInput(_) => {
                StatusCode::BAD_REQUEST
            }
            CatalogError::NotFound { .. } => StatusCode::NOT_FOUND,
            CatalogError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = match &err {
            CatalogError::Storage(inner) => {
                log::error!("Catalog storage failure: {:#}", inner);
                "internal storage error".to_string()
            }
            other => other.to_string(),
        };
        Self {
            status,
            error: err.kind(),
            message,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.error.to_string(),
                message: self.message,
            }),
        )
            .into_response()
    }
}

/// Runs a catalog operation on the blocking pool; SQLite calls never run on the
/// async workers.
async fn blocking<S, T, F>(catalog: Catalog<S>, op: F) -> Result<T, ApiError>
where
    S: Storage + Send + 'static,
    T: Send + 'static,
    F: FnOnce(&Catalog<S>) -> CatalogResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || op(&catalog))
        .await
        .map_err(|err| {
            log::error!("Catalog task failed: {}", err);
            ApiError::internal()
        })?
        .map_err(ApiError::from)
}

fn message(text: &str) -> Json<MessageResponse> {
    Json(MessageResponse {
        message: text.to_string(),
    })
}

pub async fn home() -> &'static str {
    "Welcome to Product Management Tool API! Try /categories, /products"
}

pub async fn health<S: Storage + Clone + Send + Sync + 'static>(
    State(state): State<AppState<S>>,
) -> impl IntoResponse {
    let uptime_secs = state.started_at.elapsed().map(|d| d.as_secs()).unwrap_or(0);
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
            uptime_secs,
        }),
    )
}

pub async fn list_categories<S: Storage + Clone + Send + Sync + 'static>(
    State(state): State<AppState<S>>,
) -> Result<Json<Vec<CategoryResponse>>, ApiError> {
    let categories = blocking(state.catalog, |catalog| catalog.list_categories()).await?;
    Ok(Json(categories.into_iter().map(Into::into).collect()))
}

pub async fn add_category<S: Storage + Clone + Send + Sync + 'static>(
    State(state): State<AppState<S>>,
    payload: Result<Json<NameRequest>, JsonRejection>,
) -> Result<Json<CreatedResponse>, ApiError> {
    let Json(request) = payload.map_err(ApiError::malformed)?;
    let category =
        blocking(state.catalog, move |catalog| catalog.create_category(&request.name)).await?;
    Ok(Json(CreatedResponse {
        message: "Category added".to_string(),
        id: category.id.0,
    }))
}

pub async fn delete_category<S: Storage + Clone + Send + Sync + 'static>(
    State(state): State<AppState<S>>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Path(id) = path.map_err(ApiError::unknown_path)?;
    blocking(state.catalog, move |catalog| {
        catalog.delete_category(CategoryId(id))
    })
    .await?;
    Ok(message("Category deleted successfully"))
}

pub async fn list_attributes<S: Storage + Clone + Send + Sync + 'static>(
    State(state): State<AppState<S>>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Vec<AttributeResponse>>, ApiError> {
    let Path(category_id) = path.map_err(ApiError::unknown_path)?;
    let attributes = blocking(state.catalog, move |catalog| {
        catalog.list_attributes(CategoryId(category_id))
    })
    .await?;
    Ok(Json(attributes.into_iter().map(Into::into).collect()))
}

pub async fn add_attribute<S: Storage + Clone + Send + Sync + 'static>(
    State(state): State<AppState<S>>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<NameRequest>, JsonRejection>,
) -> Result<Json<CreatedResponse>, ApiError> {
    let Path(category_id) = path.map_err(ApiError::unknown_path)?;
    let Json(request) = payload.map_err(ApiError::malformed)?;
    let attribute = blocking(state.catalog, move |catalog| {
        catalog.create_attribute(CategoryId(category_id), &request.name)
    })
    .await?;
    Ok(Json(CreatedResponse {
        message: "Attribute added".to_string(),
        id: attribute.id.0,
    }))
}

pub async fn delete_attribute<S: Storage + Clone + Send + Sync + 'static>(
    State(state): State<AppState<S>>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Path(id) = path.map_err(ApiError::unknown_path)?;
    blocking(state.catalog, move |catalog| {
        catalog.delete_attribute(AttributeId(id))
    })
    .await?;
    Ok(message("Attribute deleted successfully"))
}

pub async fn list_products<S: Storage + Clone + Send + Sync + 'static>(
    State(state): State<AppState<S>>,
) -> Result<Json<Vec<ProductResponse>>, ApiError> {
    let products = blocking(state.catalog, |catalog| catalog.list_products()).await?;
    Ok(Json(products.into_iter().map(Into::into).collect()))
}

pub async fn get_product<S: Storage + Clone + Send + Sync + 'static>(
    State(state): State<AppState<S>>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<ProductResponse>, ApiError> {
    let Path(id) = path.map_err(ApiError::unknown_path)?;
    let product =
        blocking(state.catalog, move |catalog| catalog.get_product(ProductId(id))).await?;
    Ok(Json(product.into()))
}

pub async fn add_product<S: Storage + Clone + Send + Sync + 'static>(
    State(state): State<AppState<S>>,
    payload: Result<Json<CreateProductRequest>, JsonRejection>,
) -> Result<Json<CreatedResponse>, ApiError> {
    let Json(request) = payload.map_err(ApiError::malformed)?;
    let product = blocking(state.catalog, move |catalog| {
        catalog.create_product(&request.name, request.category_id, &request.attributes)
    })
    .await?;
    Ok(Json(CreatedResponse {
        message: "Product added".to_string(),
        id: product.id.0,
    }))
}

pub async fn update_product<S: Storage + Clone + Send + Sync + 'static>(
    State(state): State<AppState<S>>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateProductRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Path(id) = path.map_err(ApiError::unknown_path)?;
    let Json(request) = payload.map_err(ApiError::malformed)?;
    let patch = ProductPatch {
        name: request.name,
        category_id: request.category_id,
        attributes: request.attributes,
    };
    blocking(state.catalog, move |catalog| {
        catalog.update_product(ProductId(id), &patch)
    })
    .await?;
    Ok(message("Product updated successfully"))
}

pub async fn delete_product<S: Storage + Clone + Send + Sync + 'static>(
    State(state): State<AppState<S>>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Path(id) = path.map_err(ApiError::unknown_path)?;
    blocking(state.catalog, move |catalog| {
        catalog.delete_product(ProductId(id))
    })
    .await?;
    Ok(message("Product deleted successfully"))
}

pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: "NotFound".to_string(),
            message: "endpoint not found".to_string(),
        }),
    )
}
