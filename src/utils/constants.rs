//! Shared constants and invariants

pub const DEFAULT_CONFIG_PATH: &str = "wse-token-fetcher.yaml";

pub const DEFAULT_LOGIN_URL: &str = "https://world.wallstreetenglish.com/login";
pub const DEFAULT_AUTHENTICATED_URL: &str = "https://world.wallstreetenglish.com/dashboard";
pub const DEFAULT_USERNAME_SELECTOR: &str = "#login-user-name";
pub const DEFAULT_PASSWORD_SELECTOR: &str = "#login-password";
pub const DEFAULT_SUBMIT_SELECTOR: &str = "button[type='submit']";
pub const DEFAULT_REDIRECT_MARKER: &str = "autoLogin";

pub const DEFAULT_FALLBACK_EXECUTABLE: &str = "/usr/bin/chromium-browser";
pub const DEFAULT_WINDOW_WIDTH: u32 = 1920;
pub const DEFAULT_WINDOW_HEIGHT: u32 = 1080;

pub const TOKEN_SIGNATURE_PREFIX: &str = "eyJ";
pub const DEFAULT_TOKEN_MIN_LENGTH: usize = 100;
/// Storage keys the site has used for the learner token, checked when no value has the signed-token shape.
pub const CONVENTIONAL_TOKEN_KEYS: [&str; 6] = [
    "token",
    "authToken",
    "auth_token",
    "accessToken",
    "access_token",
    "wse_auth_token",
];
pub const DISPLAY_TOKEN_CHARS: usize = 30;

pub const DEFAULT_DOCUMENT_PATH: &str = "config/wseToken";
pub const DEFAULT_SOURCE_TAG: &str = "headless-login";
pub const DEFAULT_TTL_HOURS: i64 = 10;
pub const MAX_TTL_HOURS: i64 = 24 * 365;
pub const FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com";
pub const FIRESTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";
pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const JWT_BEARER_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

// Environment variables
pub const ENV_USERNAME: &str = "WSE_USERNAME";
pub const ENV_PASSWORD: &str = "WSE_PASSWORD";
pub const ENV_FIREBASE_CREDS: &str = "FIREBASE_CREDS";
pub const ENV_FIREBASE_PROJECT_ID: &str = "FIREBASE_PROJECT_ID";
pub const ENV_FIREBASE_CLIENT_EMAIL: &str = "FIREBASE_CLIENT_EMAIL";
pub const ENV_FIREBASE_PRIVATE_KEY_BASE64: &str = "FIREBASE_PRIVATE_KEY_BASE64";
pub const ENV_FIRESTORE_EMULATOR_HOST: &str = "FIRESTORE_EMULATOR_HOST";

// Acquisition method tags persisted in the record
pub const METHOD_NETWORK: &str = "network";
pub const METHOD_STORAGE: &str = "storage";
pub const METHOD_URL_REDIRECT: &str = "url-redirect";
