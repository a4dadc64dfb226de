use std::sync::Mutex;

use little_lemon_api::{
    config::AppConfig,
    db::{create_orm_conn, create_pool},
    dto::{
        cart::AddToCartRequest,
        categories::CreateCategoryRequest,
        groups::AddGroupUserRequest,
        menu_items::{CreateMenuItemRequest, UpdateMenuItemRequest},
        orders::{CreateOrderRequest, OrderView, UpdateOrderRequest},
    },
    entity::{Groups, MenuItems, categories, groups, menu_items, user_groups, users},
    error::AppError,
    middleware::auth::{AuthUser, Role, resolve_role},
    routes::params::MenuItemQuery,
    services::{cart_service, category_service, group_service, menu_service, order_service},
    state::AppState,
};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};
use uuid::Uuid;

// Both tests truncate the same database; serialize them.
static DB_LOCK: Mutex<()> = Mutex::new(());

// Integration flow: customer fills a cart and places an order, manager
// assigns delivery crew, crew marks it delivered, manager deletes it.
#[tokio::test]
async fn cart_to_delivered_order_flow() -> anyhow::Result<()> {
    // Allow skipping when no DB is configured in the environment.
    let database_url =
        match std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")) {
            Ok(url) => url,
            Err(_) => {
                eprintln!(
                    "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
                );
                return Ok(());
            }
        };
    let _guard = DB_LOCK.lock().unwrap_or_else(|e| e.into_inner());

    let state = setup_state(&database_url).await?;

    let customer_id = create_user(&state, "customer", false).await?;
    let manager_id = create_user(&state, "manager", false).await?;
    let crew_id = create_user(&state, "crew", false).await?;
    add_to_group(&state, manager_id, "Manager").await?;
    add_to_group(&state, crew_id, "Delivery crew").await?;

    // Role resolution reads group membership fresh from the store.
    assert_eq!(resolve_role(&state.orm, customer_id).await?, Role::Customer);
    assert_eq!(resolve_role(&state.orm, manager_id).await?, Role::Manager);
    assert_eq!(resolve_role(&state.orm, crew_id).await?, Role::DeliveryCrew);

    let burger_id = create_menu_item(&state, "Burger", 500).await?;

    let customer = auth_user(customer_id, "customer", false, Role::Customer);
    let manager = auth_user(manager_id, "manager", false, Role::Manager);
    let crew = auth_user(crew_id, "crew", false, Role::DeliveryCrew);

    // Managers have no cart.
    let err = cart_service::list_cart(&state, &manager).await.unwrap_err();
    assert!(matches!(err, AppError::BadRequest(ref msg) if msg == "Not a customer"));

    // Add 2 x 5.00 burger.
    let added = cart_service::add_to_cart(
        &state,
        &customer,
        AddToCartRequest {
            menuitem_id: burger_id,
            quantity: 2,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(added.unit_price, 500);
    assert_eq!(added.price, 1000);

    // Same line twice is rejected and the cart keeps one line.
    let err = cart_service::add_to_cart(
        &state,
        &customer,
        AddToCartRequest {
            menuitem_id: burger_id,
            quantity: 1,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    let cart = cart_service::list_cart(&state, &customer)
        .await?
        .data
        .unwrap();
    assert_eq!(cart.items.len(), 1);

    // Ordering with a crew id outside the delivery crew group fails.
    let err = order_service::create_order(
        &state,
        &customer,
        CreateOrderRequest {
            delivery_crew_id: Some(manager_id),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let order = order_service::create_order(&state, &customer, CreateOrderRequest::default())
        .await?
        .data
        .unwrap();
    let order_id = match order {
        OrderView::Customer {
            id, status, total, ..
        } => {
            assert!(!status);
            assert_eq!(total, 1000);
            id
        }
        other => panic!("expected customer order view, got {other:?}"),
    };

    // The cart was consumed by the order.
    let cart = cart_service::list_cart(&state, &customer)
        .await?
        .data
        .unwrap();
    assert!(cart.items.is_empty());
    let err = order_service::create_order(&state, &customer, CreateOrderRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(ref msg) if msg == "Cart is empty"));

    // Items are an immutable snapshot of the cart lines.
    let items = order_service::get_order_items(&state, &customer, order_id)
        .await?
        .data
        .unwrap();
    assert_eq!(items.items.len(), 1);
    assert_eq!(items.items[0].quantity, 2);
    assert_eq!(items.items[0].price, 1000);
    assert_eq!(items.items[0].menuitem.title, "Burger");

    // Unassigned crew sees nothing and cannot update.
    let crew_orders = order_service::list_orders(&state, &crew, Default::default())
        .await?
        .data
        .unwrap();
    assert!(crew_orders.items.is_empty());
    let err = order_service::update_order(
        &state,
        &crew,
        order_id,
        UpdateOrderRequest {
            status: Some(true),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    // Customers cannot update orders at all.
    let err = order_service::update_order(
        &state,
        &customer,
        order_id,
        UpdateOrderRequest {
            status: Some(true),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    // Assigning someone outside the delivery crew group fails and the
    // order keeps its (empty) assignment.
    let err = order_service::update_order(
        &state,
        &manager,
        order_id,
        UpdateOrderRequest {
            status: None,
            delivery_crew_id: Some(Some(customer_id)),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    // Manager assigns the crew.
    let updated = order_service::update_order(
        &state,
        &manager,
        order_id,
        UpdateOrderRequest {
            status: None,
            delivery_crew_id: Some(Some(crew_id)),
        },
    )
    .await?
    .data
    .unwrap();
    match updated {
        OrderView::Manager {
            delivery_crew,
            status,
            ..
        } => {
            assert!(!status);
            assert_eq!(delivery_crew.unwrap().id, crew_id);
        }
        other => panic!("expected manager order view, got {other:?}"),
    }

    // A status-only patch leaves the assignment alone.
    let crew_orders = order_service::list_orders(&state, &crew, Default::default())
        .await?
        .data
        .unwrap();
    assert_eq!(crew_orders.items.len(), 1);
    let delivered = order_service::update_order(
        &state,
        &crew,
        order_id,
        UpdateOrderRequest {
            status: Some(true),
            ..Default::default()
        },
    )
    .await?
    .data
    .unwrap();
    match delivered {
        OrderView::DeliveryCrew { status, .. } => assert!(status),
        other => panic!("expected delivery crew order view, got {other:?}"),
    }

    // Manager unassigns with an explicit null.
    let unassigned = order_service::update_order(
        &state,
        &manager,
        order_id,
        UpdateOrderRequest {
            status: None,
            delivery_crew_id: Some(None),
        },
    )
    .await?
    .data
    .unwrap();
    match unassigned {
        OrderView::Manager {
            delivery_crew,
            status,
            ..
        } => {
            assert!(status);
            assert!(delivery_crew.is_none());
        }
        other => panic!("expected manager order view, got {other:?}"),
    }

    // Only managers delete; the order and its items go together.
    let err = order_service::delete_order(&state, &customer, order_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));
    order_service::delete_order(&state, &manager, order_id).await?;
    let err = order_service::get_order_items(&state, &manager, order_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    Ok(())
}

// Catalog writes are manager-gated; group membership is admin-gated and
// feeds straight back into role resolution.
#[tokio::test]
async fn menu_gating_and_group_admin() -> anyhow::Result<()> {
    let database_url =
        match std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")) {
            Ok(url) => url,
            Err(_) => {
                eprintln!(
                    "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
                );
                return Ok(());
            }
        };
    let _guard = DB_LOCK.lock().unwrap_or_else(|e| e.into_inner());

    let state = setup_state(&database_url).await?;

    let admin_id = create_user(&state, "admin", true).await?;
    let promoted_id = create_user(&state, "promoted", false).await?;

    let admin = auth_user(admin_id, "admin", true, Role::Customer);
    let customer = auth_user(promoted_id, "promoted", false, Role::Customer);

    // Customers cannot write the catalog and nothing is created.
    let err = menu_service::create_menu_item(
        &state,
        &customer,
        CreateMenuItemRequest {
            title: "Pasta".into(),
            price: 900,
            featured: false,
            category_id: Uuid::new_v4(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));
    assert_eq!(MenuItems::find().count(&state.orm).await?, 0);

    // Group admin requires is_staff.
    let err = group_service::add_group_user(
        &state,
        &customer,
        "manager",
        AddGroupUserRequest {
            username: Some("promoted".into()),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    // Unsupported group slug and unknown username are rejected.
    let err = group_service::add_group_user(
        &state,
        &admin,
        "kitchen",
        AddGroupUserRequest {
            username: Some("promoted".into()),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(ref msg) if msg == "Group not supported"));
    let err = group_service::add_group_user(
        &state,
        &admin,
        "manager",
        AddGroupUserRequest {
            username: Some("nobody".into()),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    // Promote, and the next role resolution sees it. Re-adding is a no-op.
    group_service::add_group_user(
        &state,
        &admin,
        "manager",
        AddGroupUserRequest {
            username: Some("promoted".into()),
        },
    )
    .await?;
    group_service::add_group_user(
        &state,
        &admin,
        "manager",
        AddGroupUserRequest {
            username: Some("promoted".into()),
        },
    )
    .await?;
    assert_eq!(resolve_role(&state.orm, promoted_id).await?, Role::Manager);

    let members = group_service::list_group_users(&state, &admin, "manager")
        .await?
        .data
        .unwrap();
    assert_eq!(members.items.len(), 1);
    assert_eq!(members.items[0].username, "promoted");

    // Now a manager: catalog writes work.
    let manager = auth_user(promoted_id, "promoted", false, Role::Manager);
    let category = category_service::create_category(
        &state,
        &manager,
        CreateCategoryRequest {
            title: "Mains".into(),
        },
    )
    .await?
    .data
    .unwrap();

    // Duplicate titles lose to the unique index.
    let err = category_service::create_category(
        &state,
        &manager,
        CreateCategoryRequest {
            title: "Mains".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let item = menu_service::create_menu_item(
        &state,
        &manager,
        CreateMenuItemRequest {
            title: "Pasta".into(),
            price: 900,
            featured: true,
            category_id: category.id,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(item.category, "Mains");

    // A category holding items cannot be deleted.
    let err = category_service::delete_category(&state, &manager, category.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // Non-manager delete is rejected and the item survives.
    let err = menu_service::delete_menu_item(&state, &customer, item.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));
    assert_eq!(MenuItems::find().count(&state.orm).await?, 1);

    // Non-manager patch leaves the item untouched.
    let err = menu_service::update_menu_item(
        &state,
        &customer,
        item.id,
        UpdateMenuItemRequest {
            price: Some(100),
            title: None,
            featured: None,
            category_id: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));
    let unchanged = menu_service::get_menu_item(&state, item.id)
        .await?
        .data
        .unwrap();
    assert_eq!(unchanged.price, 900);

    // Listing filters by category title and featured flag.
    let listed = menu_service::list_menu_items(
        &state,
        MenuItemQuery {
            category: Some("Mains".into()),
            featured: Some(true),
            ..Default::default()
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(listed.items.len(), 1);
    let empty = menu_service::list_menu_items(
        &state,
        MenuItemQuery {
            category: Some("Desserts".into()),
            ..Default::default()
        },
    )
    .await?
    .data
    .unwrap();
    assert!(empty.items.is_empty());

    // Demote and the manager role is gone on the next resolution.
    group_service::remove_group_user(&state, &admin, "manager", promoted_id).await?;
    assert_eq!(resolve_role(&state.orm, promoted_id).await?, Role::Customer);

    Ok(())
}

async fn setup_state(database_url: &str) -> anyhow::Result<AppState> {
    let pool = create_pool(database_url).await?;
    let orm = create_orm_conn(database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    // Clean tables between runs; the seeded groups stay.
    sqlx::query(
        "TRUNCATE TABLE order_items, orders, cart_items, user_groups, menu_items, categories, audit_logs, users RESTART IDENTITY CASCADE",
    )
    .execute(&pool)
    .await?;

    Ok(AppState {
        pool,
        orm,
        config: AppConfig {
            database_url: database_url.to_string(),
            host: "127.0.0.1".into(),
            port: 0,
            jwt_secret: "test-secret".into(),
        },
    })
}

fn auth_user(user_id: Uuid, username: &str, is_staff: bool, role: Role) -> AuthUser {
    AuthUser {
        user_id,
        username: username.to_string(),
        is_staff,
        role,
    }
}

async fn create_user(state: &AppState, username: &str, is_staff: bool) -> anyhow::Result<Uuid> {
    let user = users::ActiveModel {
        id: Set(Uuid::new_v4()),
        username: Set(username.to_string()),
        email: Set(format!("{username}@example.com")),
        password_hash: Set("dummy".into()),
        is_staff: Set(is_staff),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(user.id)
}

async fn add_to_group(state: &AppState, user_id: Uuid, group_name: &str) -> anyhow::Result<()> {
    let group = Groups::find()
        .filter(groups::Column::Name.eq(group_name))
        .one(&state.orm)
        .await?
        .expect("seeded group");

    user_groups::ActiveModel {
        user_id: Set(user_id),
        group_id: Set(group.id),
    }
    .insert(&state.orm)
    .await?;

    Ok(())
}

async fn create_menu_item(state: &AppState, title: &str, price: i64) -> anyhow::Result<Uuid> {
    let category = categories::ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set(format!("{title} category")),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    let item = menu_items::ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set(title.to_string()),
        price: Set(price),
        featured: Set(false),
        category_id: Set(category.id),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(item.id)
}
