//! Page endpoints, routed by path ahead of the conventional route.

mod account;

pub use account::{ConfirmEmailPage, LoginPage, LogoutPage, RegisterPage};

use crate::controllers::{ActionContext, Verbs};
use crate::error::AppResult;
use async_trait::async_trait;
use axum::response::Response;
use std::sync::Arc;

#[async_trait]
pub trait Page: Send + Sync {
    /// Route path, matched case-insensitively
    fn path(&self) -> &'static str;

    fn verbs(&self) -> Verbs;

    fn authorize(&self) -> bool {
        false
    }

    async fn handle(&self, ctx: ActionContext) -> AppResult<Response>;
}

pub struct PageRegistry {
    pages: Vec<Arc<dyn Page>>,
}

impl PageRegistry {
    pub fn new(pages: Vec<Arc<dyn Page>>) -> Self {
        Self { pages }
    }

    /// The Identity area pages
    pub fn discover() -> Self {
        Self::new(vec![
            Arc::new(RegisterPage),
            Arc::new(ConfirmEmailPage),
            Arc::new(LoginPage),
            Arc::new(LogoutPage),
        ])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Page>> {
        self.pages.iter()
    }
}
