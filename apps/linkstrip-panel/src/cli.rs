use anyhow::{Context, Result};
use linkstrip_db::repositories::user_repo::UserRepository;
use sqlx::PgPool;

/// `linkstrip-panel admin reset-password <email> <new_pass>`
pub async fn reset_password(pool: &PgPool, email: &str, new_pass: &str) -> Result<()> {
    let hash = bcrypt::hash(new_pass, bcrypt::DEFAULT_COST).context("Failed to hash password")?;

    let updated = UserRepository::new(pool.clone())
        .set_password_hash(email, &hash)
        .await?;
    if !updated {
        return Err(anyhow::anyhow!("No account with email '{}'", email));
    }

    println!("Password for '{}' has been reset.", email);
    Ok(())
}

/// `linkstrip-panel admin promote <email>` — bootstrap/rescue path that
/// bypasses the super-admin HTTP rule; it requires shell access to the box.
pub async fn promote(pool: &PgPool, email: &str) -> Result<()> {
    let updated = UserRepository::new(pool.clone()).set_role(email, "admin").await?;
    if !updated {
        return Err(anyhow::anyhow!("No account with email '{}'", email));
    }

    println!("'{}' is now an admin.", email);
    Ok(())
}
