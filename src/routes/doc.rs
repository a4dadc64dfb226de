use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{LoginRequest, LoginResponse, RegisterRequest},
        cart::{AddToCartRequest, CartItemView, CartList},
        categories::{CategoryList, CreateCategoryRequest, ReplaceCategoryRequest},
        groups::{AddGroupUserRequest, GroupUserList},
        menu_items::{
            CreateMenuItemRequest, MenuItemList, ReplaceMenuItemRequest, UpdateMenuItemRequest,
        },
        orders::{
            CreateOrderRequest, OrderItemList, OrderItemView, OrderList, OrderView,
            UpdateOrderRequest,
        },
    },
    models::{Category, MenuItem, User, UserSummary},
    response::{ApiResponse, Meta},
    routes::{auth, cart, categories, groups, health, menu_items, orders, params},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        menu_items::list_menu_items,
        menu_items::get_menu_item,
        menu_items::create_menu_item,
        menu_items::replace_menu_item,
        menu_items::update_menu_item,
        menu_items::delete_menu_item,
        categories::list_categories,
        categories::get_category,
        categories::create_category,
        categories::replace_category,
        categories::delete_category,
        cart::cart_list,
        cart::add_to_cart,
        cart::clear_cart,
        orders::list_orders,
        orders::create_order,
        orders::get_order_items,
        orders::update_order,
        orders::delete_order,
        groups::list_group_users,
        groups::add_group_user,
        groups::remove_group_user
    ),
    components(
        schemas(
            User,
            UserSummary,
            Category,
            MenuItem,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            CreateMenuItemRequest,
            ReplaceMenuItemRequest,
            UpdateMenuItemRequest,
            MenuItemList,
            CreateCategoryRequest,
            ReplaceCategoryRequest,
            CategoryList,
            AddToCartRequest,
            CartItemView,
            CartList,
            CreateOrderRequest,
            UpdateOrderRequest,
            OrderView,
            OrderList,
            OrderItemView,
            OrderItemList,
            AddGroupUserRequest,
            GroupUserList,
            params::Pagination,
            params::MenuItemQuery,
            params::OrderListQuery,
            Meta,
            ApiResponse<MenuItem>,
            ApiResponse<MenuItemList>,
            ApiResponse<CategoryList>,
            ApiResponse<CartList>,
            ApiResponse<OrderList>,
            ApiResponse<OrderItemList>,
            ApiResponse<GroupUserList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Menu", description = "Menu item endpoints"),
        (name = "Categories", description = "Category endpoints"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Orders", description = "Order endpoints"),
        (name = "Groups", description = "Group membership endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
