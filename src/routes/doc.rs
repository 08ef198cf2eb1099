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
        auth::{
            AuthResponse, ForgotPasswordRequest, GoogleAuthUrl, ResetPasswordRequest,
            SignInRequest, SignUpRequest,
        },
        cart::{AddToCartRequest, UpdateCartItemRequest},
        categories::CategoryNameRequest,
        orders::{CreateOrderRequest, OrderItemRequest, UpdateOrderStatusRequest},
        products::{CreateProductRequest, UpdateProductRequest},
        reviews::{CreateReviewRequest, UpdateReviewRequest},
        upload::UploadedImage,
        users::{ChangePasswordRequest, UpdateProfileRequest, UpdateUserRequest},
        wishlist::{AddToWishlistRequest, WishlistCheck},
    },
    models::{
        CartItem, Category, NamedRef, Order, OrderItem, OrderStatus, Product, Review,
        Subcategory, User, UserSummary, WishlistItem,
    },
    response::{ErrorResponse, FieldError, MessageResponse, Meta},
    routes::{
        auth, cart, categories, health, orders, params, products, reviews, upload, users,
        wishlist,
    },
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
        auth::sign_up,
        auth::sign_in,
        auth::forgot_password,
        auth::reset_password,
        auth::google_url,
        auth::google_callback,
        users::get_profile,
        users::update_profile,
        users::change_password,
        users::list_users,
        users::get_user,
        users::update_user,
        users::delete_user,
        categories::list_categories,
        categories::get_category,
        categories::create_category,
        categories::update_category,
        categories::delete_category,
        categories::create_subcategory,
        categories::update_subcategory,
        categories::delete_subcategory,
        products::list_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        cart::cart_list,
        cart::add_to_cart,
        cart::update_cart_item,
        cart::remove_from_cart,
        cart::clear_cart,
        orders::create_order,
        orders::list_my_orders,
        orders::list_all_orders,
        orders::get_order,
        orders::update_order_status,
        orders::delete_order,
        reviews::list_reviews,
        reviews::get_review,
        reviews::create_review,
        reviews::update_review,
        reviews::delete_review,
        wishlist::list_wishlist,
        wishlist::add_to_wishlist,
        wishlist::remove_from_wishlist,
        wishlist::check_wishlist,
        upload::upload_image
    ),
    components(
        schemas(
            User,
            UserSummary,
            NamedRef,
            Category,
            Subcategory,
            Product,
            CartItem,
            Order,
            OrderItem,
            OrderStatus,
            Review,
            WishlistItem,
            SignUpRequest,
            SignInRequest,
            ForgotPasswordRequest,
            ResetPasswordRequest,
            AuthResponse,
            GoogleAuthUrl,
            UpdateProfileRequest,
            ChangePasswordRequest,
            UpdateUserRequest,
            CategoryNameRequest,
            CreateProductRequest,
            UpdateProductRequest,
            AddToCartRequest,
            UpdateCartItemRequest,
            CreateOrderRequest,
            OrderItemRequest,
            UpdateOrderStatusRequest,
            CreateReviewRequest,
            UpdateReviewRequest,
            AddToWishlistRequest,
            WishlistCheck,
            UploadedImage,
            params::SortOrder,
            params::ProductSortBy,
            params::OrderSortBy,
            params::ReviewSortBy,
            params::UserSortBy,
            Meta,
            FieldError,
            MessageResponse,
            ErrorResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Sign-up, sign-in, password reset and Google OAuth"),
        (name = "Users", description = "Profile and admin user management"),
        (name = "Categories", description = "Categories and subcategories"),
        (name = "Products", description = "Product catalog"),
        (name = "Cart", description = "Shopping cart"),
        (name = "Orders", description = "Checkout and order lifecycle"),
        (name = "Reviews", description = "Product reviews and ratings"),
        (name = "Wishlist", description = "Saved products"),
        (name = "Upload", description = "Product image upload"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_route_group_is_documented() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;
        for path in [
            "/api/health",
            "/api/auth/signup",
            "/api/orders/{id}/status",
            "/api/categories/{id}/subcategories/{sub_id}",
            "/api/wishlist/check/{product_id}",
            "/api/upload",
        ] {
            assert!(paths.contains_key(path), "missing {path}");
        }
        assert!(doc
            .components
            .as_ref()
            .is_some_and(|c| c.security_schemes.contains_key("bearer_auth")));
    }
}
