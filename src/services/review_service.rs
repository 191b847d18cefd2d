use chrono::NaiveDate;

use crate::{
    error::{AppError, AppResult, FieldError},
    models::{NewReview, Review, User},
    services::product_service::CatalogStore,
    store::BackingStore,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewForm {
    pub product_id: String,
    pub rating: u8,
    pub comment: String,
}

/// Appends a review by `user`. Reviews are never edited or removed.
pub async fn submit_review(
    store: &dyn BackingStore,
    catalog: &CatalogStore,
    user: &User,
    form: ReviewForm,
    today: NaiveDate,
) -> AppResult<Review> {
    let mut errors = Vec::new();
    if !(1..=5).contains(&form.rating) {
        errors.push(FieldError::new("rating", "Rating must be between 1 and 5"));
    }
    let comment = form.comment.trim();
    if comment.is_empty() {
        errors.push(FieldError::new("comment", "Comment is required"));
    }
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }
    if catalog.product(&form.product_id).is_none() {
        return Err(AppError::NotFound);
    }

    let review = store
        .create_review(NewReview {
            product_id: form.product_id,
            user_id: user.id.clone(),
            rating: form.rating,
            comment: comment.to_string(),
            date: today,
        })
        .await?;
    tracing::info!(review_id = %review.id, product_id = %review.product_id, "review added");
    Ok(review)
}

/// Mean rating of a product's reviews, if it has any.
pub fn average_rating(reviews: &[&Review]) -> Option<f32> {
    if reviews.is_empty() {
        return None;
    }
    let sum: u32 = reviews.iter().map(|r| u32::from(r.rating)).sum();
    Some(sum as f32 / reviews.len() as f32)
}
