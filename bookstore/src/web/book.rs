use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use mongodb::bson::DateTime as BsonDateTime;
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::auth::AdminUser;
use crate::model::mongo_model::Book;
use crate::web::{ApiError, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_books).post(create_book))
        .route(
            "/{id}",
            get(get_book).put(update_book).delete(delete_book),
        )
}

#[derive(Debug, Clone, Serialize)]
pub struct BookView {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub title: String,
    pub price: f64,
    pub category: String,
    pub genre: Option<String>,
    pub publisher: Option<String>,
    pub author: Option<String>,
    pub language: Option<String>,
    pub pages: Option<i32>,
    pub image: String,
    pub description: String,
    pub created_at: String,
}

impl From<&Book> for BookView {
    fn from(book: &Book) -> Self {
        BookView {
            id: book._id.to_hex(),
            name: book.name.clone(),
            title: book.title.clone(),
            price: book.price,
            category: book.category.clone(),
            genre: book.genre.clone(),
            publisher: book.publisher.clone(),
            author: book.author.clone(),
            language: book.language.clone(),
            pages: book.pages,
            image: book.image.clone(),
            description: book.description.clone(),
            created_at: book.created_at.try_to_rfc3339_string().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BookRequest {
    pub name: Option<String>,
    pub title: Option<String>,
    pub category: Option<String>,
    pub price: Option<f64>,
    pub genre: Option<String>,
    pub publisher: Option<String>,
    pub author: Option<String>,
    pub language: Option<String>,
    pub pages: Option<i32>,
    pub image: Option<String>,
    pub description: Option<String>,
}

impl BookRequest {
    /// Validates the request and builds the document to store.
    fn into_book(self) -> Result<Book, ApiError> {
        let (Some(name), Some(title), Some(category), Some(price)) =
            (self.name, self.title, self.category, self.price)
        else {
            return Err(ApiError::Validation(
                "name, price, category and title are required".to_string(),
            ));
        };
        if name.trim().is_empty() || title.trim().is_empty() || category.trim().is_empty() {
            return Err(ApiError::Validation(
                "name, price, category and title are required".to_string(),
            ));
        }
        if price < 0.0 {
            return Err(ApiError::Validation(
                "price must not be negative".to_string(),
            ));
        }

        let now = BsonDateTime::now();
        Ok(Book {
            _id: ObjectId::new(),
            name: name.trim().to_string(),
            title: title.trim().to_string(),
            price,
            category: category.trim().to_string(),
            genre: self.genre,
            publisher: self.publisher,
            author: self.author,
            language: self.language,
            pages: self.pages,
            image: self.image.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        })
    }
}

fn parse_book_id(id: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(id).map_err(|_| ApiError::Validation("Invalid book id".to_string()))
}

pub async fn get_books(State(state): State<AppState>) -> Result<Json<Vec<BookView>>, ApiError> {
    let books = state.books.get_books().await?;
    Ok(Json(books.iter().map(BookView::from).collect()))
}

pub async fn get_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BookView>, ApiError> {
    let id = parse_book_id(&id)?;
    let book = state
        .books
        .get_book(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Book not found".to_string()))?;
    Ok(Json(BookView::from(&book)))
}

pub async fn create_book(
    _admin: AdminUser,
    State(state): State<AppState>,
    Json(body): Json<BookRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let book = body.into_book()?;
    state.books.insert_book(&book).await?;
    tracing::info!(book_id = %book._id, "book created");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Book created successfully",
            "book": BookView::from(&book),
        })),
    ))
}

pub async fn update_book(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<BookRequest>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_book_id(&id)?;
    let book = body.into_book()?;
    let updated = state
        .books
        .update_book(id, &book)
        .await?
        .ok_or_else(|| ApiError::NotFound("Book not found".to_string()))?;

    Ok(Json(json!({
        "message": "Book updated successfully",
        "book": BookView::from(&updated),
    })))
}

pub async fn delete_book(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_book_id(&id)?;
    let deleted = state
        .books
        .delete_book(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Book not found".to_string()))?;
    tracing::info!(book_id = %deleted._id, "book deleted");

    Ok(Json(json!({
        "message": "Book deleted successfully",
        "book": BookView::from(&deleted),
    })))
}
