use std::collections::HashMap;

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
    ActiveValue::{NotSet, Set},
    sea_query::{Expr, LockType, OnConflict},
};

use super::{BackingStore, new_document_id, requested_stock};
use crate::{
    entity::{
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        products::{
            ActiveModel as ProductActive, Column as ProdCol, Entity as Products,
            Model as ProductModel,
        },
        reviews::{ActiveModel as ReviewActive, Column as ReviewCol, Entity as Reviews, Model as ReviewModel},
        users::{ActiveModel as UserActive, Column as UserCol, Entity as Users, Model as UserModel},
    },
    error::{AppError, AppResult},
    models::{
        NewProduct, NewReview, Order, OrderItem, OrderStatus, Product, ProductPatch, Review, User,
        UserCredentials, UserRecord,
    },
};

/// Postgres-backed document store.
#[derive(Clone)]
pub struct OrmStore {
    conn: DatabaseConnection,
}

impl OrmStore {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    async fn items_for<C: ConnectionTrait>(
        conn: &C,
        order_id: &str,
    ) -> AppResult<Vec<OrderItem>> {
        OrderItems::find()
            .filter(OrderItemCol::OrderId.eq(order_id))
            .order_by_asc(OrderItemCol::Position)
            .all(conn)
            .await?
            .into_iter()
            .map(order_item_from_entity)
            .collect()
    }

    async fn write_items<C: ConnectionTrait>(conn: &C, order: &Order) -> AppResult<()> {
        for (position, line) in order.items.iter().enumerate() {
            OrderItemActive {
                order_id: Set(order.id.clone()),
                position: Set(to_i32(position as u64, "position")?),
                product_id: Set(line.product_id.clone()),
                quantity: Set(to_i32(u64::from(line.quantity), "quantity")?),
                price: Set(line.price),
            }
            .insert(conn)
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl BackingStore for OrmStore {
    async fn fetch_products(&self) -> AppResult<Vec<Product>> {
        Products::find()
            .order_by_asc(ProdCol::CreatedAt)
            .order_by_asc(ProdCol::Id)
            .all(&self.conn)
            .await?
            .into_iter()
            .map(product_from_entity)
            .collect()
    }

    async fn fetch_users(&self) -> AppResult<Vec<User>> {
        Users::find()
            .order_by_asc(UserCol::CreatedAt)
            .order_by_asc(UserCol::Id)
            .all(&self.conn)
            .await?
            .into_iter()
            .map(user_from_entity)
            .collect()
    }

    async fn fetch_orders(&self) -> AppResult<Vec<Order>> {
        let orders = Orders::find()
            .order_by_asc(OrderCol::Date)
            .order_by_asc(OrderCol::Id)
            .all(&self.conn)
            .await?;

        let mut items: HashMap<String, Vec<OrderItem>> = HashMap::new();
        for model in OrderItems::find()
            .order_by_asc(OrderItemCol::OrderId)
            .order_by_asc(OrderItemCol::Position)
            .all(&self.conn)
            .await?
        {
            let order_id = model.order_id.clone();
            items
                .entry(order_id)
                .or_default()
                .push(order_item_from_entity(model)?);
        }

        orders
            .into_iter()
            .map(|model| {
                let lines = items.remove(&model.id).unwrap_or_default();
                order_from_entity(model, lines)
            })
            .collect()
    }

    async fn fetch_reviews(&self) -> AppResult<Vec<Review>> {
        Reviews::find()
            .order_by_asc(ReviewCol::Date)
            .order_by_asc(ReviewCol::Id)
            .all(&self.conn)
            .await?
            .into_iter()
            .map(review_from_entity)
            .collect()
    }

    async fn find_credentials(&self, email: &str) -> AppResult<Option<UserCredentials>> {
        let model = Users::find()
            .filter(UserCol::Email.eq(email.trim().to_lowercase()))
            .one(&self.conn)
            .await?;
        model
            .map(|model| {
                let password_hash = model.password_hash.clone();
                Ok(UserCredentials {
                    user: user_from_entity(model)?,
                    password_hash,
                })
            })
            .transpose()
    }

    async fn upsert_user(&self, record: UserRecord) -> AppResult<User> {
        let existing = match &record.id {
            Some(id) => Users::find_by_id(id.clone()).one(&self.conn).await?,
            None => None,
        };

        let model = match existing {
            Some(model) => {
                let mut active: UserActive = model.into();
                active.username = Set(record.username);
                active.email = Set(record.email.to_lowercase());
                active.role = Set(record.role.as_str().to_string());
                if let Some(hash) = record.password_hash {
                    active.password_hash = Set(Some(hash));
                }
                active.update(&self.conn).await?
            }
            None => {
                let clash = Users::find()
                    .filter(
                        Condition::any()
                            .add(UserCol::Email.eq(record.email.to_lowercase()))
                            .add(UserCol::Username.eq(record.username.clone())),
                    )
                    .one(&self.conn)
                    .await?;
                if clash.is_some() {
                    return Err(AppError::Auth("Username or email already exists".into()));
                }

                UserActive {
                    id: Set(record.id.unwrap_or_else(new_document_id)),
                    username: Set(record.username),
                    email: Set(record.email.to_lowercase()),
                    password_hash: Set(record.password_hash),
                    role: Set(record.role.as_str().to_string()),
                    created_at: NotSet,
                }
                .insert(&self.conn)
                .await?
            }
        };

        user_from_entity(model)
    }

    async fn create_product(&self, product: NewProduct) -> AppResult<Product> {
        let model = product_active(product.into_product(new_document_id()))?
            .insert(&self.conn)
            .await?;
        product_from_entity(model)
    }

    async fn put_product(&self, product: Product) -> AppResult<Product> {
        Products::insert(product_active(product.clone())?)
            .on_conflict(
                OnConflict::column(ProdCol::Id)
                    .update_columns([
                        ProdCol::Name,
                        ProdCol::Category,
                        ProdCol::Price,
                        ProdCol::Stock,
                        ProdCol::Brand,
                        ProdCol::Description,
                        ProdCol::Rating,
                        ProdCol::Image,
                    ])
                    .to_owned(),
            )
            .exec(&self.conn)
            .await?;
        Ok(product)
    }

    async fn update_product(&self, id: &str, patch: ProductPatch) -> AppResult<Product> {
        let existing = Products::find_by_id(id.to_string())
            .one(&self.conn)
            .await?
            .ok_or(AppError::NotFound)?;

        let mut product = product_from_entity(existing.clone())?;
        patch.apply(&mut product);

        let mut active: ProductActive = existing.into();
        active.name = Set(product.name);
        active.category = Set(product.category.as_str().to_string());
        active.price = Set(product.price);
        active.stock = Set(to_i32(u64::from(product.stock), "stock")?);
        active.brand = Set(product.brand);
        active.description = Set(product.description);
        active.image = Set(product.image);
        let updated = active.update(&self.conn).await?;

        product_from_entity(updated)
    }

    async fn delete_product(&self, id: &str) -> AppResult<()> {
        let result = Products::delete_by_id(id.to_string()).exec(&self.conn).await?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    async fn place_order(&self, order: Order) -> AppResult<Order> {
        let txn = self.conn.begin().await?;

        let requested = requested_stock(&order);
        for &(product_id, quantity) in &requested {
            let product = Products::find_by_id(product_id.to_string())
                .lock(LockType::Update)
                .one(&txn)
                .await?
                .ok_or(AppError::NotFound)?;
            let available = u32::try_from(product.stock).unwrap_or(0);
            if available < quantity {
                return Err(AppError::InsufficientStock {
                    product_id: product_id.to_string(),
                    available,
                    requested: quantity,
                });
            }
        }

        OrderActive {
            id: Set(order.id.clone()),
            user_id: Set(order.user_id.clone()),
            status: Set(order.status.as_str().to_string()),
            total: Set(order.total),
            date: Set(order.date),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;

        Self::write_items(&txn, &order).await?;

        for &(product_id, quantity) in &requested {
            let quantity = to_i32(u64::from(quantity), "quantity")?;
            Products::update_many()
                .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(quantity))
                .filter(ProdCol::Id.eq(product_id))
                .exec(&txn)
                .await?;
        }

        txn.commit().await?;
        Ok(order)
    }

    async fn put_order(&self, order: Order) -> AppResult<Order> {
        let txn = self.conn.begin().await?;

        Orders::insert(OrderActive {
            id: Set(order.id.clone()),
            user_id: Set(order.user_id.clone()),
            status: Set(order.status.as_str().to_string()),
            total: Set(order.total),
            date: Set(order.date),
            created_at: NotSet,
        })
        .on_conflict(
            OnConflict::column(OrderCol::Id)
                .update_columns([OrderCol::UserId, OrderCol::Status, OrderCol::Total, OrderCol::Date])
                .to_owned(),
        )
        .exec(&txn)
        .await?;

        OrderItems::delete_many()
            .filter(OrderItemCol::OrderId.eq(order.id.clone()))
            .exec(&txn)
            .await?;
        Self::write_items(&txn, &order).await?;

        txn.commit().await?;
        Ok(order)
    }

    async fn update_order_status(&self, id: &str, status: OrderStatus) -> AppResult<Order> {
        let existing = Orders::find_by_id(id.to_string())
            .one(&self.conn)
            .await?
            .ok_or(AppError::NotFound)?;

        let mut active: OrderActive = existing.into();
        active.status = Set(status.as_str().to_string());
        let updated = active.update(&self.conn).await?;

        let items = Self::items_for(&self.conn, &updated.id).await?;
        order_from_entity(updated, items)
    }

    async fn create_review(&self, review: NewReview) -> AppResult<Review> {
        let model = ReviewActive {
            id: Set(new_document_id()),
            product_id: Set(review.product_id),
            user_id: Set(review.user_id),
            rating: Set(i16::from(review.rating)),
            comment: Set(review.comment),
            date: Set(review.date),
            created_at: NotSet,
        }
        .insert(&self.conn)
        .await?;
        review_from_entity(model)
    }

    async fn put_review(&self, review: Review) -> AppResult<Review> {
        Reviews::insert(ReviewActive {
            id: Set(review.id.clone()),
            product_id: Set(review.product_id.clone()),
            user_id: Set(review.user_id.clone()),
            rating: Set(i16::from(review.rating)),
            comment: Set(review.comment.clone()),
            date: Set(review.date),
            created_at: NotSet,
        })
        .on_conflict(
            OnConflict::column(ReviewCol::Id)
                .update_columns([
                    ReviewCol::ProductId,
                    ReviewCol::UserId,
                    ReviewCol::Rating,
                    ReviewCol::Comment,
                    ReviewCol::Date,
                ])
                .to_owned(),
        )
        .exec(&self.conn)
        .await?;
        Ok(review)
    }
}

fn to_i32(value: u64, field: &str) -> AppResult<i32> {
    i32::try_from(value).map_err(|_| AppError::BadRequest(format!("{field} is out of range")))
}

fn corrupt(what: &str, id: &str) -> AppError {
    AppError::Internal(anyhow::anyhow!("stored {what} {id} is malformed"))
}

fn product_active(product: Product) -> AppResult<ProductActive> {
    Ok(ProductActive {
        id: Set(product.id),
        name: Set(product.name),
        category: Set(product.category.as_str().to_string()),
        price: Set(product.price),
        stock: Set(to_i32(u64::from(product.stock), "stock")?),
        brand: Set(product.brand),
        description: Set(product.description),
        rating: Set(product.rating),
        image: Set(product.image),
        created_at: NotSet,
    })
}

fn product_from_entity(model: ProductModel) -> AppResult<Product> {
    Ok(Product {
        category: model
            .category
            .parse()
            .map_err(|_| corrupt("product", &model.id))?,
        stock: u32::try_from(model.stock).map_err(|_| corrupt("product", &model.id))?,
        id: model.id,
        name: model.name,
        price: model.price,
        brand: model.brand,
        description: model.description,
        rating: model.rating,
        image: model.image,
    })
}

fn user_from_entity(model: UserModel) -> AppResult<User> {
    Ok(User {
        role: model.role.parse().map_err(|_| corrupt("user", &model.id))?,
        id: model.id,
        username: model.username,
        email: model.email,
    })
}

fn order_from_entity(model: OrderModel, items: Vec<OrderItem>) -> AppResult<Order> {
    Ok(Order {
        status: model.status.parse().map_err(|_| corrupt("order", &model.id))?,
        id: model.id,
        user_id: model.user_id,
        total: model.total,
        date: model.date,
        items,
    })
}

fn order_item_from_entity(model: OrderItemModel) -> AppResult<OrderItem> {
    Ok(OrderItem {
        quantity: u32::try_from(model.quantity).map_err(|_| corrupt("order", &model.order_id))?,
        product_id: model.product_id,
        price: model.price,
    })
}

fn review_from_entity(model: ReviewModel) -> AppResult<Review> {
    Ok(Review {
        rating: u8::try_from(model.rating).map_err(|_| corrupt("review", &model.id))?,
        id: model.id,
        product_id: model.product_id,
        user_id: model.user_id,
        comment: model.comment,
        date: model.date,
    })
}
