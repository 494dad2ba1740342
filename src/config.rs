use std::env;
use dotenvy::dotenv;

fn env_or<T: std::str::FromStr>(key: &str, default: &str) -> T {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .unwrap_or_else(|_| panic!("{} must be a valid number", key))
}

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,
    pub refresh_token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_register_per_min: u32,
    pub rate_refresh_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,

    // Approval routing, e.g. "line_manager,hr"
    pub approval_chain_default: String,
    // "sick=line_manager;maternity=line_manager,hr,admin"
    pub approval_chains_by_type: String,
    // "2=hr"
    pub approval_chains_by_department: String,

    // First admin login, created at startup when no admin exists
    pub bootstrap_admin_username: Option<String>,
    pub bootstrap_admin_password: Option<String>,
    pub bootstrap_admin_employee_code: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        Self {
            server_addr: env::var("SERVER_ADDR").expect("SERVER_ADDR must be set"),
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            jwt_secret: env::var("JWT_SECRET").expect("JWT_SECRET must be set"),
            access_token_ttl: env_or("ACCESS_TOKEN_TTL", "900"), // default 15 min
            refresh_token_ttl: env_or("REFRESH_TOKEN_TTL", "604800"), // default 7 days

            rate_login_per_min: env_or("RATE_LOGIN_PER_MIN", "60"),
            rate_register_per_min: env_or("RATE_REGISTER_PER_MIN", "30"),
            rate_refresh_per_min: env_or("RATE_REFRESH_PER_MIN", "30"),
            rate_protected_per_min: env_or("RATE_PROTECTED_PER_MIN", "1000"),

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api/v1".to_string()),

            approval_chain_default: env::var("APPROVAL_CHAIN_DEFAULT")
                .unwrap_or_else(|_| "line_manager,hr".to_string()),
            approval_chains_by_type: env::var("APPROVAL_CHAINS").unwrap_or_default(),
            approval_chains_by_department: env::var("APPROVAL_CHAINS_BY_DEPARTMENT")
                .unwrap_or_default(),

            bootstrap_admin_username: env::var("BOOTSTRAP_ADMIN_USERNAME").ok(),
            bootstrap_admin_password: env::var("BOOTSTRAP_ADMIN_PASSWORD").ok(),
            bootstrap_admin_employee_code: env::var("BOOTSTRAP_ADMIN_EMPLOYEE_CODE")
                .unwrap_or_else(|_| "EMP001".to_string()),
        }
    }
}
