use actix_web::{web, HttpResponse};
use bigdecimal::BigDecimal;
use chrono::Utc;
use diesel::prelude::*;
use diesel::PgConnection;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::Identity;
use crate::cart::Cart;
use crate::db::DbPool;
use crate::errors::AppError;
use crate::models::address::{Address, AddressSnapshot};
use crate::models::order::{NewOrder, Order, OrderStatus, PaymentStatus};
use crate::models::order_line::{NewOrderLine, OrderLine};
use crate::models::product::Product;
use crate::schema::{addresses, order_lines, orders, products};

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequest {
    /// Product id the line refers to.
    pub product: Uuid,
    pub name: String,
    pub quantity: i32,
    /// Decimal price as a string to avoid floating-point issues, e.g. "9.99"
    pub price: String,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub order_items: Vec<OrderItemRequest>,
    pub shipping_address_id: Uuid,
    /// Opaque token for the external payment gateway.
    pub payment_method_id: String,
    pub items_price: String,
    pub shipping_price: String,
    pub total_price: String,
}

impl CreateOrderRequest {
    /// Builds the checkout request from a cart. The cart's line snapshots
    /// become the order items and the totals are derived from them, so a
    /// well-formed cart always produces a request that passes the server-side
    /// totals check.
    pub fn from_cart(
        cart: &Cart,
        shipping_address_id: Uuid,
        payment_method_id: &str,
        shipping_price: &BigDecimal,
    ) -> Self {
        let items_price = cart.items_price();
        let total_price = &items_price + shipping_price;
        CreateOrderRequest {
            order_items: cart
                .lines()
                .iter()
                .map(|l| OrderItemRequest {
                    product: l.product_id,
                    name: l.name.clone(),
                    quantity: l.quantity as i32,
                    price: l.unit_price.to_string(),
                    image: l.image.clone(),
                })
                .collect(),
            shipping_address_id,
            payment_method_id: payment_method_id.to_string(),
            items_price: items_price.to_string(),
            shipping_price: shipping_price.to_string(),
            total_price: total_price.to_string(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemResponse {
    pub product: Uuid,
    pub name: String,
    pub quantity: i32,
    pub price: String,
    pub image: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddressResponse {
    pub street: String,
    pub number: String,
    pub complement: Option<String>,
    pub district: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: Uuid,
    /// Minimal identity of the owning user.
    pub user: Uuid,
    pub order_items: Vec<OrderItemResponse>,
    pub shipping_address: ShippingAddressResponse,
    pub payment_method: String,
    pub payment_status: String,
    pub items_price: String,
    pub shipping_price: String,
    pub total_price: String,
    pub status: String,
    pub paid_at: Option<String>,
    pub delivered_at: Option<String>,
    pub created_at: String,
}

fn order_response(order: Order, lines: Vec<OrderLine>) -> OrderResponse {
    OrderResponse {
        id: order.id,
        user: order.user_id,
        order_items: lines
            .into_iter()
            .map(|l| OrderItemResponse {
                product: l.product_id,
                name: l.name,
                quantity: l.quantity,
                price: l.unit_price.to_string(),
                image: l.image,
            })
            .collect(),
        shipping_address: ShippingAddressResponse {
            street: order.ship_street,
            number: order.ship_number,
            complement: order.ship_complement,
            district: order.ship_district,
            city: order.ship_city,
            state: order.ship_state,
            postal_code: order.ship_postal_code,
        },
        payment_method: order.payment_method,
        payment_status: order.payment_status,
        items_price: order.items_price.to_string(),
        shipping_price: order.shipping_price.to_string(),
        total_price: order.total_price.to_string(),
        status: order.status,
        paid_at: order.paid_at.map(|t| t.to_rfc3339()),
        delivered_at: order.delivered_at.map(|t| t.to_rfc3339()),
        created_at: order.created_at.to_rfc3339(),
    }
}

// ── Pagination ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct ListOrdersParams {
    /// Page number (1-based). Defaults to 1.
    #[serde(default = "default_page")]
    pub page: i64,
    /// Number of items per page. Defaults to 20, maximum 100.
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    20
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListOrdersResponse {
    pub items: Vec<OrderResponse>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

// ── Validation ───────────────────────────────────────────────────────────────

#[derive(Debug)]
struct ValidatedLine {
    product_id: Uuid,
    name: String,
    quantity: i32,
    unit_price: BigDecimal,
    image: Option<String>,
}

#[derive(Debug)]
struct ValidatedOrder {
    shipping_address_id: Uuid,
    payment_method: String,
    lines: Vec<ValidatedLine>,
    items_price: BigDecimal,
    shipping_price: BigDecimal,
    total_price: BigDecimal,
}

fn parse_price(field: &str, raw: &str) -> Result<BigDecimal, AppError> {
    BigDecimal::from_str(raw)
        .map_err(|e| AppError::Validation(format!("Invalid {} '{}': {}", field, raw, e)))
}

/// Checks the raw request and recomputes its totals. The caller-claimed
/// `itemsPrice`/`totalPrice` are never trusted: they must match the sums
/// derived from the submitted lines or the request is rejected.
fn validate_request(req: CreateOrderRequest) -> Result<ValidatedOrder, AppError> {
    if req.order_items.is_empty() {
        return Err(AppError::Validation("Order has no items".to_string()));
    }

    let mut lines = Vec::with_capacity(req.order_items.len());
    for item in &req.order_items {
        if item.quantity < 1 {
            return Err(AppError::Validation(format!(
                "Invalid quantity {} for product {}",
                item.quantity, item.product
            )));
        }
        lines.push(ValidatedLine {
            product_id: item.product,
            name: item.name.clone(),
            quantity: item.quantity,
            unit_price: parse_price("price", &item.price)?,
            image: item.image.clone(),
        });
    }

    let claimed_items_price = parse_price("itemsPrice", &req.items_price)?;
    let shipping_price = parse_price("shippingPrice", &req.shipping_price)?;
    let claimed_total_price = parse_price("totalPrice", &req.total_price)?;

    let items_price: BigDecimal = lines
        .iter()
        .map(|l| &l.unit_price * BigDecimal::from(l.quantity))
        .sum();
    if items_price != claimed_items_price {
        return Err(AppError::Validation(format!(
            "itemsPrice mismatch: claimed {}, computed {}",
            claimed_items_price, items_price
        )));
    }

    let total_price = &items_price + &shipping_price;
    if total_price != claimed_total_price {
        return Err(AppError::Validation(format!(
            "totalPrice mismatch: claimed {}, computed {}",
            claimed_total_price, total_price
        )));
    }

    Ok(ValidatedOrder {
        shipping_address_id: req.shipping_address_id,
        payment_method: req.payment_method_id,
        lines,
        items_price,
        shipping_price,
        total_price,
    })
}

// ── Storage helpers ──────────────────────────────────────────────────────────

/// Looks up a saved address and freezes it into a snapshot. The address must
/// exist (404) and belong to the requester (403).
fn resolve_address(
    conn: &mut PgConnection,
    address_id: Uuid,
    requester_id: Uuid,
) -> Result<AddressSnapshot, AppError> {
    let address = addresses::table
        .find(address_id)
        .select(Address::as_select())
        .first(conn)
        .optional()?;

    let Some(address) = address else {
        return Err(AppError::NotFound("Address"));
    };
    if address.user_id != requester_id {
        return Err(AppError::Forbidden(
            "Address does not belong to the caller".to_string(),
        ));
    }
    Ok(address.into())
}

/// Atomic conditional decrement of one product's stock counter:
/// `UPDATE products SET stock = stock - q WHERE id = ? AND stock >= q`.
/// Zero rows updated means the product is absent (404) or short (409);
/// either error aborts the surrounding transaction, rolling back the order
/// insert and every decrement already applied.
fn apply_stock_decrement(
    conn: &mut PgConnection,
    product_id: Uuid,
    quantity: i32,
) -> Result<(), AppError> {
    let updated = diesel::update(
        products::table.filter(
            products::id
                .eq(product_id)
                .and(products::stock.ge(quantity)),
        ),
    )
    .set((
        products::stock.eq(products::stock - quantity),
        products::updated_at.eq(Utc::now()),
    ))
    .execute(conn)?;

    if updated == 1 {
        return Ok(());
    }

    let product = products::table
        .find(product_id)
        .select(Product::as_select())
        .first(conn)
        .optional()?;
    match product {
        None => Err(AppError::NotFound("Product")),
        Some(p) => Err(AppError::StockExhausted {
            product_id,
            requested: quantity,
            available: p.stock,
        }),
    }
}

fn load_order(
    conn: &mut PgConnection,
    order_id: Uuid,
) -> Result<Option<(Order, Vec<OrderLine>)>, AppError> {
    let order = orders::table
        .find(order_id)
        .select(Order::as_select())
        .first(conn)
        .optional()?;

    let Some(order) = order else {
        return Ok(None);
    };

    let lines = order_lines::table
        .filter(order_lines::order_id.eq(order.id))
        .order(order_lines::created_at.asc())
        .select(OrderLine::as_select())
        .load(conn)?;

    Ok(Some((order, lines)))
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST /orders
///
/// Places an order from a checkout request. Address resolution, the order
/// insert, the line inserts, and one conditional stock decrement per line all
/// run inside a single database transaction: a failed decrement (or a missing
/// or foreign address) leaves no order row and no partial decrements behind.
#[utoipa::path(
    post,
    path = "/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created successfully", body = OrderResponse),
        (status = 400, description = "Empty order or malformed/mismatching totals"),
        (status = 403, description = "Address belongs to another user"),
        (status = 404, description = "Address or product not found"),
        (status = 409, description = "Insufficient stock for a line"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn create_order(
    pool: web::Data<DbPool>,
    identity: Identity,
    body: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse, AppError> {
    let validated = validate_request(body.into_inner())?;
    let user_id = identity.user_id;

    let (order, lines) = web::block(move || {
        let mut conn = pool.get()?;

        conn.transaction::<_, AppError, _>(|conn| {
            let snapshot = resolve_address(conn, validated.shipping_address_id, user_id)?;

            let order_id = Uuid::new_v4();
            diesel::insert_into(orders::table)
                .values(&NewOrder {
                    id: order_id,
                    user_id,
                    status: OrderStatus::Processing.as_str().to_string(),
                    payment_method: validated.payment_method.clone(),
                    payment_status: PaymentStatus::Pending.as_str().to_string(),
                    ship_street: snapshot.street,
                    ship_number: snapshot.number,
                    ship_complement: snapshot.complement,
                    ship_district: snapshot.district,
                    ship_city: snapshot.city,
                    ship_state: snapshot.state,
                    ship_postal_code: snapshot.postal_code,
                    items_price: validated.items_price.clone(),
                    shipping_price: validated.shipping_price.clone(),
                    total_price: validated.total_price.clone(),
                })
                .execute(conn)?;

            // Decrement before inserting each line so a vanished product
            // surfaces as 404 rather than a foreign-key violation.
            for line in &validated.lines {
                apply_stock_decrement(conn, line.product_id, line.quantity)?;
                diesel::insert_into(order_lines::table)
                    .values(&NewOrderLine {
                        id: Uuid::new_v4(),
                        order_id,
                        product_id: line.product_id,
                        name: line.name.clone(),
                        image: line.image.clone(),
                        quantity: line.quantity,
                        unit_price: line.unit_price.clone(),
                    })
                    .execute(conn)?;
            }

            load_order(conn, order_id)?
                .ok_or_else(|| AppError::Internal("Order vanished inside transaction".to_string()))
        })
    })
    .await??;

    Ok(HttpResponse::Created().json(order_response(order, lines)))
}

/// GET /orders/myorders
///
/// Returns all of the caller's orders, newest first.
#[utoipa::path(
    get,
    path = "/orders/myorders",
    responses(
        (status = 200, description = "The caller's orders", body = [OrderResponse]),
        (status = 403, description = "Missing caller identity"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn list_my_orders(
    pool: web::Data<DbPool>,
    identity: Identity,
) -> Result<HttpResponse, AppError> {
    let user_id = identity.user_id;

    let responses = web::block(move || {
        let mut conn = pool.get()?;

        let rows: Vec<Order> = orders::table
            .filter(orders::user_id.eq(user_id))
            .order(orders::created_at.desc())
            .select(Order::as_select())
            .load(&mut conn)?;

        let lines: Vec<Vec<OrderLine>> = OrderLine::belonging_to(&rows)
            .order(order_lines::created_at.asc())
            .select(OrderLine::as_select())
            .load(&mut conn)?
            .grouped_by(&rows);

        Ok::<_, AppError>(
            rows.into_iter()
                .zip(lines)
                .map(|(order, lines)| order_response(order, lines))
                .collect::<Vec<_>>(),
        )
    })
    .await??;

    Ok(HttpResponse::Ok().json(responses))
}

/// GET /orders/{id}
///
/// Returns the order with its lines. Only the owner or an admin may read it.
#[utoipa::path(
    get,
    path = "/orders/{id}",
    params(
        ("id" = Uuid, Path, description = "Order UUID"),
    ),
    responses(
        (status = 200, description = "Order found", body = OrderResponse),
        (status = 403, description = "Caller is neither the owner nor an admin"),
        (status = 404, description = "Order not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn get_order(
    pool: web::Data<DbPool>,
    identity: Identity,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();

    let result = web::block(move || {
        let mut conn = pool.get()?;
        load_order(&mut conn, order_id)
    })
    .await??;

    let Some((order, lines)) = result else {
        return Err(AppError::NotFound("Order"));
    };
    if order.user_id != identity.user_id && !identity.is_admin() {
        return Err(AppError::Forbidden(
            "Order belongs to another user".to_string(),
        ));
    }

    Ok(HttpResponse::Ok().json(order_response(order, lines)))
}

/// GET /orders
///
/// Admin-only paginated list of all orders (without their lines).
/// Use `page` (1-based) and `limit` to control pagination.
#[utoipa::path(
    get,
    path = "/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number (1-based, default 1)"),
        ("limit" = Option<i64>, Query, description = "Items per page (default 20, max 100)"),
    ),
    responses(
        (status = 200, description = "Paginated list of orders", body = ListOrdersResponse),
        (status = 403, description = "Caller is not an admin"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn list_orders(
    pool: web::Data<DbPool>,
    identity: Identity,
    query: web::Query<ListOrdersParams>,
) -> Result<HttpResponse, AppError> {
    identity.require_admin()?;

    let params = query.into_inner();
    let page = params.page.max(1);
    let limit = params.limit.clamp(1, 100);
    let offset = (page - 1) * limit;

    let result = web::block(move || {
        let mut conn = pool.get()?;

        let total: i64 = orders::table.count().get_result(&mut conn)?;

        let rows = orders::table
            .select(Order::as_select())
            .order(orders::created_at.desc())
            .limit(limit)
            .offset(offset)
            .load(&mut conn)?;

        let items: Vec<OrderResponse> = rows
            .into_iter()
            .map(|o| order_response(o, vec![]))
            .collect();

        Ok::<_, AppError>(ListOrdersResponse {
            items,
            total,
            page,
            limit,
        })
    })
    .await??;

    Ok(HttpResponse::Ok().json(result))
}

/// PUT /orders/{id}/pay
///
/// Admin-only. Marks the order's payment as settled and stamps `paidAt`.
/// Idempotent: once paid, repeat calls return the order unchanged without
/// moving the timestamp.
#[utoipa::path(
    put,
    path = "/orders/{id}/pay",
    params(
        ("id" = Uuid, Path, description = "Order UUID"),
    ),
    responses(
        (status = 200, description = "Updated order", body = OrderResponse),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "Order not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn mark_paid(
    pool: web::Data<DbPool>,
    identity: Identity,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    identity.require_admin()?;
    let order_id = path.into_inner();

    let result = web::block(move || {
        let mut conn = pool.get()?;

        let now = Utc::now();
        diesel::update(
            orders::table.filter(
                orders::id
                    .eq(order_id)
                    .and(orders::payment_status.ne(PaymentStatus::Paid.as_str())),
            ),
        )
        .set((
            orders::payment_status.eq(PaymentStatus::Paid.as_str()),
            orders::paid_at.eq(Some(now)),
            orders::updated_at.eq(now),
        ))
        .execute(&mut conn)?;

        load_order(&mut conn, order_id)
    })
    .await??;

    match result {
        Some((order, lines)) => Ok(HttpResponse::Ok().json(order_response(order, lines))),
        None => Err(AppError::NotFound("Order")),
    }
}

/// PUT /orders/{id}/deliver
///
/// Admin-only. Marks the order as delivered and stamps `deliveredAt`.
/// Idempotent in the same way as `/pay`.
#[utoipa::path(
    put,
    path = "/orders/{id}/deliver",
    params(
        ("id" = Uuid, Path, description = "Order UUID"),
    ),
    responses(
        (status = 200, description = "Updated order", body = OrderResponse),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "Order not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn mark_delivered(
    pool: web::Data<DbPool>,
    identity: Identity,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    identity.require_admin()?;
    let order_id = path.into_inner();

    let result = web::block(move || {
        let mut conn = pool.get()?;

        let now = Utc::now();
        diesel::update(
            orders::table.filter(
                orders::id
                    .eq(order_id)
                    .and(orders::status.ne(OrderStatus::Delivered.as_str())),
            ),
        )
        .set((
            orders::status.eq(OrderStatus::Delivered.as_str()),
            orders::delivered_at.eq(Some(now)),
            orders::updated_at.eq(now),
        ))
        .execute(&mut conn)?;

        load_order(&mut conn, order_id)
    })
    .await??;

    match result {
        Some((order, lines)) => Ok(HttpResponse::Ok().json(order_response(order, lines))),
        None => Err(AppError::NotFound("Order")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::ProductSnapshot;

    fn item(price: &str, quantity: i32) -> OrderItemRequest {
        OrderItemRequest {
            product: Uuid::new_v4(),
            name: "Widget".to_string(),
            quantity,
            price: price.to_string(),
            image: None,
        }
    }

    fn request(items: Vec<OrderItemRequest>, items_price: &str, total_price: &str) -> CreateOrderRequest {
        CreateOrderRequest {
            order_items: items,
            shipping_address_id: Uuid::new_v4(),
            payment_method_id: "tok_1".to_string(),
            items_price: items_price.to_string(),
            shipping_price: "5.00".to_string(),
            total_price: total_price.to_string(),
        }
    }

    #[test]
    fn empty_order_is_rejected() {
        let err = validate_request(request(vec![], "0.00", "5.00")).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let err = validate_request(request(vec![item("10.00", 0)], "0.00", "5.00")).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn malformed_price_is_rejected() {
        let err =
            validate_request(request(vec![item("ten dollars", 1)], "10.00", "15.00")).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn mismatching_items_price_is_rejected() {
        // Two at 10.00 is 20.00, not the claimed 19.00.
        let err = validate_request(request(vec![item("10.00", 2)], "19.00", "24.00")).unwrap_err();
        match err {
            AppError::Validation(msg) => assert!(msg.contains("itemsPrice")),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn mismatching_total_price_is_rejected() {
        let err = validate_request(request(vec![item("10.00", 2)], "20.00", "26.00")).unwrap_err();
        match err {
            AppError::Validation(msg) => assert!(msg.contains("totalPrice")),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn valid_request_recomputes_totals() {
        let validated =
            validate_request(request(vec![item("10.00", 2)], "20.00", "25.00")).expect("valid");

        assert_eq!(validated.items_price, BigDecimal::from_str("20.00").unwrap());
        assert_eq!(validated.total_price, BigDecimal::from_str("25.00").unwrap());
        assert_eq!(validated.lines.len(), 1);
        assert_eq!(validated.lines[0].quantity, 2);
    }

    #[test]
    fn totals_comparison_ignores_decimal_scale() {
        // "20" and "20.00" are the same value.
        let validated =
            validate_request(request(vec![item("10.00", 2)], "20", "25.0")).expect("valid");
        assert_eq!(validated.items_price, BigDecimal::from_str("20").unwrap());
    }

    #[test]
    fn from_cart_produces_a_request_that_validates() {
        let mut cart = Cart::new();
        let product = ProductSnapshot {
            product_id: Uuid::new_v4(),
            name: "Widget".to_string(),
            unit_price: BigDecimal::from_str("10.00").unwrap(),
            image: None,
            stock: 5,
        };
        cart.add(&product, 2);

        let req = CreateOrderRequest::from_cart(
            &cart,
            Uuid::new_v4(),
            "tok_1",
            &BigDecimal::from_str("5.00").unwrap(),
        );

        assert_eq!(req.order_items.len(), 1);
        assert_eq!(req.order_items[0].quantity, 2);

        let validated = validate_request(req).expect("cart-built request validates");
        assert_eq!(validated.items_price, BigDecimal::from_str("20.00").unwrap());
        assert_eq!(validated.total_price, BigDecimal::from_str("25.00").unwrap());
        assert_eq!(validated.payment_method, "tok_1");
    }
}
