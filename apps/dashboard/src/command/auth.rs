use tracing::info;
use trading::models::{Registration, User};

use super::local_naive;
use crate::{Data, Error};

fn print_user(data: &Data, user: &User) {
    println!("{} {} <{}>", user.first_name, user.last_name, user.email);
    if let Some(role) = &user.role {
        println!("  role:   {role}");
    }
    if let Some(created) = user.created_at {
        println!("  member: {}", local_naive(created, data.config.timezone));
    }
}

pub async fn login(data: &Data, email: &str, password: &str) -> Result<(), Error> {
    let user = data.client.login(email, password).await?;
    println!("Logged in as {} {}.", user.first_name, user.last_name);
    Ok(())
}

pub async fn register(
    data: &Data,
    email: String,
    password: String,
    first_name: String,
    last_name: String,
) -> Result<(), Error> {
    let registration = Registration {
        email,
        password,
        first_name,
        last_name,
    };
    let user = data.client.register(&registration).await?;
    println!("Welcome, {}! Your account is ready.", user.first_name);
    Ok(())
}

pub fn logout(data: &Data) -> Result<(), Error> {
    data.client.logout();
    println!("Logged out.");
    Ok(())
}

pub async fn refresh(data: &Data) -> Result<(), Error> {
    data.client.refresh_session().await?;
    info!("session renewed on request");
    println!("Session renewed.");
    Ok(())
}

pub async fn profile(
    data: &Data,
    first_name: Option<&str>,
    last_name: Option<&str>,
) -> Result<(), Error> {
    let user = if first_name.is_some() || last_name.is_some() {
        let user = data.client.update_profile(first_name, last_name).await?;
        println!("Profile updated.");
        user
    } else {
        data.client.profile().await?
    };

    print_user(data, &user);
    Ok(())
}
