//! Credentialed login flows.
//!
//! One flow per platform, same shape: dismiss the cookie banner if one
//! shows up, type both credential fields with keystroke pacing, submit,
//! dismiss post-login prompts, and verify we actually left the login page.

use super::{type_with_pacing, BrowserSession, Locate, Target};
use crate::error::LoginError;
use crate::pacing::{DelayRange, DelayScheduler};
use std::time::Duration;

pub const FACEBOOK_URL: &str = "https://www.facebook.com/";
pub const INSTAGRAM_URL: &str = "https://www.instagram.com/";

const FB_EMAIL_FIELD: &str = "#email";
const FB_PASSWORD_FIELD: &str = "#pass";
const FB_LOGIN_BUTTON: &str = "button[name='login']";

const IG_USERNAME_FIELD: &str = "input[name='username']";
const IG_PASSWORD_FIELD: &str = "input[name='password']";
const IG_LOGIN_BUTTON: &str = "button[type='submit']";

/// How long to wait for the login form before giving up.
const FORM_TIMEOUT: Duration = Duration::from_secs(10);

/// Short wait for the optional cookie banner.
const BANNER_TIMEOUT: Duration = Duration::from_secs(5);

/// Post-submit settle window; login redirects are slow.
const SETTLE: DelayRange = DelayRange::from_secs(5, 8);

/// Account credentials, read from the environment.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    /// Facebook login, from `PROSPECTOR_EMAIL` / `PROSPECTOR_PASSWORD`.
    pub fn from_env() -> Result<Self, LoginError> {
        let email = std::env::var("PROSPECTOR_EMAIL")
            .map_err(|_| LoginError::MissingCredentials("PROSPECTOR_EMAIL"))?;
        let password = std::env::var("PROSPECTOR_PASSWORD")
            .map_err(|_| LoginError::MissingCredentials("PROSPECTOR_PASSWORD"))?;
        Ok(Self { email, password })
    }

    /// Instagram login, from `PROSPECTOR_IG_USERNAME` / `PROSPECTOR_IG_PASSWORD`.
    pub fn instagram_from_env() -> Result<Self, LoginError> {
        let email = std::env::var("PROSPECTOR_IG_USERNAME")
            .map_err(|_| LoginError::MissingCredentials("PROSPECTOR_IG_USERNAME"))?;
        let password = std::env::var("PROSPECTOR_IG_PASSWORD")
            .map_err(|_| LoginError::MissingCredentials("PROSPECTOR_IG_PASSWORD"))?;
        Ok(Self { email, password })
    }
}

/// Log in to Facebook. Fails if the form never appears or the platform
/// keeps us on the login page after submitting.
pub async fn facebook(
    session: &mut dyn BrowserSession,
    credentials: &Credentials,
    pacer: &mut DelayScheduler,
) -> Result<(), LoginError> {
    tracing::info!("logging in to facebook");
    session.navigate(FACEBOOK_URL).await?;
    pacer.action().await;

    dismiss_cookie_banner(session, pacer).await?;
    submit_credentials(
        session,
        credentials,
        pacer,
        FB_EMAIL_FIELD,
        FB_PASSWORD_FIELD,
        FB_LOGIN_BUTTON,
    )
    .await?;

    if session.current_url().await?.contains("login") {
        return Err(LoginError::Rejected);
    }

    tracing::info!("login succeeded");
    Ok(())
}

/// Log in to Instagram, then dismiss the "Save Login Info" and
/// notifications prompts that follow a fresh login.
pub async fn instagram(
    session: &mut dyn BrowserSession,
    credentials: &Credentials,
    pacer: &mut DelayScheduler,
) -> Result<(), LoginError> {
    tracing::info!("logging in to instagram");
    session.navigate(INSTAGRAM_URL).await?;
    pacer.action().await;

    dismiss_cookie_banner(session, pacer).await?;
    submit_credentials(
        session,
        credentials,
        pacer,
        IG_USERNAME_FIELD,
        IG_PASSWORD_FIELD,
        IG_LOGIN_BUTTON,
    )
    .await?;

    // Two separate prompts, same dismissal label.
    for _ in 0..2 {
        dismiss_prompt(session, pacer, "Not Now").await?;
    }

    if session.current_url().await?.contains("login") {
        return Err(LoginError::Rejected);
    }

    tracing::info!("login succeeded");
    Ok(())
}

async fn submit_credentials(
    session: &mut dyn BrowserSession,
    credentials: &Credentials,
    pacer: &mut DelayScheduler,
    user_selector: &str,
    password_selector: &str,
    button_selector: &str,
) -> Result<(), LoginError> {
    let user_field = Target::css(user_selector);
    if session.wait_clickable(&user_field, FORM_TIMEOUT).await? == Locate::NotFound {
        return Err(LoginError::FormMissing);
    }
    type_with_pacing(session, &user_field, &credentials.email, pacer).await?;

    let password_field = Target::css(password_selector);
    type_with_pacing(session, &password_field, &credentials.password, pacer).await?;

    session.click(&Target::css(button_selector)).await?;
    pacer.wait(SETTLE).await;
    Ok(())
}

/// Accept the cookie prompt when it appears; its absence is not an error.
async fn dismiss_cookie_banner(
    session: &mut dyn BrowserSession,
    pacer: &mut DelayScheduler,
) -> Result<(), LoginError> {
    for label in ["Accept All", "Allow all cookies", "Accept", "Allow"] {
        let banner = Target::labeled(label);
        if session.wait_clickable(&banner, BANNER_TIMEOUT).await? == Locate::Found {
            session.click(&banner).await?;
            pacer.action().await;
            return Ok(());
        }
    }
    tracing::debug!("no cookie prompt detected");
    Ok(())
}

/// Click a dismissable prompt by label when present.
async fn dismiss_prompt(
    session: &mut dyn BrowserSession,
    pacer: &mut DelayScheduler,
    label: &str,
) -> Result<(), LoginError> {
    let prompt = Target::labeled(label);
    if session.wait_clickable(&prompt, BANNER_TIMEOUT).await? == Locate::Found {
        session.click(&prompt).await?;
        pacer.action().await;
    }
    Ok(())
}
