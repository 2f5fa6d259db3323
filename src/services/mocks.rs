use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::mock;

use crate::models::{Category, Order, OrderStatus, Product, RepositoryError, User};
use crate::repositories::{CategoryRepository, OrderRepository, ProductRepository, UserRepository};
use crate::services::mailer::{EmailMessage, MailError, Mailer};
use crate::services::payment_gateway::{
    GatewayError, GatewayOrder, GatewayOrderRequest, PaymentGateway,
};

mock! {
    pub ProductRepo {}

    #[async_trait]
    impl ProductRepository for ProductRepo {
        async fn find_all(&self) -> Result<Vec<Product>, RepositoryError>;
        async fn find_by_id(&self, id: &str) -> Result<Option<Product>, RepositoryError>;
        async fn find_by_category(&self, category_id: &str) -> Result<Vec<Product>, RepositoryError>;
        async fn create(&self, product: Product) -> Result<Product, RepositoryError>;
    }
}

mock! {
    pub CategoryRepo {}

    #[async_trait]
    impl CategoryRepository for CategoryRepo {
        async fn find_all(&self) -> Result<Vec<Category>, RepositoryError>;
        async fn find_by_id(&self, id: &str) -> Result<Option<Category>, RepositoryError>;
        async fn find_by_name(&self, name: &str) -> Result<Option<Category>, RepositoryError>;
        async fn create(&self, category: Category) -> Result<Category, RepositoryError>;
    }
}

mock! {
    pub UserRepo {}

    #[async_trait]
    impl UserRepository for UserRepo {
        async fn find_by_id(&self, id: &str) -> Result<Option<User>, RepositoryError>;
        async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;
        async fn create(&self, user: User) -> Result<User, RepositoryError>;
    }
}

mock! {
    pub OrderRepo {}

    #[async_trait]
    impl OrderRepository for OrderRepo {
        async fn create(&self, order: Order) -> Result<Order, RepositoryError>;
        async fn find_by_id(&self, id: &str) -> Result<Option<Order>, RepositoryError>;
        async fn find_by_gateway_order_id(&self, gateway_order_id: &str) -> Result<Option<Order>, RepositoryError>;
        async fn find_by_user(&self, user_id: &str) -> Result<Vec<Order>, RepositoryError>;
        async fn transition_status(
            &self,
            id: &str,
            from: OrderStatus,
            to: OrderStatus,
            payment_id: Option<String>,
        ) -> Result<Option<Order>, RepositoryError>;
        async fn find_pending_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, RepositoryError>;
    }
}

mock! {
    pub Gateway {}

    #[async_trait]
    impl PaymentGateway for Gateway {
        async fn create_order(&self, request: GatewayOrderRequest) -> Result<GatewayOrder, GatewayError>;
    }
}

mock! {
    pub Mail {}

    #[async_trait]
    impl Mailer for Mail {
        async fn send(&self, message: EmailMessage) -> Result<(), MailError>;
    }
}
