pub mod config;
pub mod decider;
pub mod domain {
    pub mod payment;
}
pub mod http {
    pub mod handlers {
        pub mod payments;
    }
}
pub mod processors;
pub mod repo {
    pub mod payments_repo;
}
pub mod service {
    pub mod dispatcher;
    pub mod health_monitor;
    pub mod reconciler;
}

#[derive(Clone)]
pub struct AppState {
    pub payments_repo: repo::payments_repo::PaymentsRepo,
}
