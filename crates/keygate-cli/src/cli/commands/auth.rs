//! Auth command handlers.

use std::io::{self, BufRead, IsTerminal, Read, Write};
use std::net::TcpListener;
use std::time::Duration;

use anyhow::{Context, Result};
use keygate_core::auth::{
    AuthClient, AuthController, SessionStore, complete_oauth_callback, jwt, parse_callback_url,
    validate,
};
use keygate_core::config::{Config, paths};

fn auth_client(config: &Config) -> Result<AuthClient> {
    let provider = &config.provider;
    let client_id = provider
        .effective_client_id()
        .context("provider.client_id is not set (run 'keygate config init' and edit the config)")?;
    let endpoint = provider
        .effective_endpoint()
        .context("provider.endpoint is not set (run 'keygate config init' and edit the config)")?;

    Ok(AuthClient::new(
        client_id,
        endpoint,
        provider.effective_domain().unwrap_or_default(),
        provider.effective_redirect_uri().unwrap_or_default(),
    ))
}

pub fn session_store(config: &Config) -> Result<SessionStore> {
    let client_id = config
        .provider
        .effective_client_id()
        .context("provider.client_id is not set (run 'keygate config init' and edit the config)")?;
    Ok(SessionStore::new(client_id))
}

fn prompt_line(label: &str) -> Result<String> {
    print!("{label}");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().lock().read_line(&mut input)?;
    Ok(input.trim_end_matches(['\r', '\n']).to_string())
}

fn print_problems(problems: &[String]) {
    for problem in problems {
        eprintln!("  - {problem}");
    }
}

pub async fn login(config: &Config, email: Option<&str>) -> Result<()> {
    let client = auth_client(config)?;
    let store = session_store(config)?;

    let email = match email {
        Some(email) => email.to_string(),
        None => prompt_line("Email: ")?,
    };
    let password = prompt_line("Password: ")?;

    if let Err(problems) = validate::validate_login(&email, &password) {
        eprintln!("Invalid input:");
        print_problems(&problems);
        anyhow::bail!("login input rejected");
    }

    let mut controller = AuthController::new(client, store);
    let creds = controller.login(&email, &password).await?;

    println!(
        "✓ Logged in as {} (token: {})",
        creds.username,
        jwt::mask(&creds.access_token)
    );
    println!("  Session saved to: {}", paths::session_path().display());

    Ok(())
}

pub async fn login_hosted(config: &Config) -> Result<()> {
    let client = auth_client(config)?;
    let store = session_store(config)?;

    let redirect_uri = config
        .provider
        .effective_redirect_uri()
        .context("provider.redirect_uri is not set (required for the hosted flow)")?
        .to_string();
    config
        .provider
        .effective_domain()
        .context("provider.domain is not set (required for the hosted flow)")?;

    let state = uuid::Uuid::new_v4().to_string();
    let auth_url = client.authorize_url(&state);

    println!("To log in with the hosted UI:");
    println!();
    println!("  1. A browser window will open (or visit the URL below)");
    println!("  2. Log in and authorize access");
    println!("  3. If redirected to localhost, return here to continue");
    println!("  4. Otherwise, paste the full redirect URL");
    println!();
    println!("Authorization URL:");
    println!("  {auth_url}");
    println!();

    // Try to open browser (best effort, skip in tests)
    if std::env::var("KEYGATE_NO_BROWSER").is_err() {
        let _ = open::that(&auth_url);
    }

    // Prefer the local callback in interactive sessions, fall back to paste.
    let local_url = if io::stdin().is_terminal() {
        wait_for_callback_url(&redirect_uri, Duration::from_secs(120))
    } else {
        None
    };
    let callback_url = match local_url {
        Some(url) => url,
        None => {
            let input = prompt_line("Paste the full redirect URL: ")?;
            if input.is_empty() {
                anyhow::bail!("Redirect URL cannot be empty");
            }
            input
        }
    };

    if let Ok(params) = parse_callback_url(&callback_url)
        && params.state.as_deref() != Some(state.as_str())
    {
        anyhow::bail!("State mismatch");
    }

    println!("Exchanging code for tokens...");
    let creds = complete_oauth_callback(&client, &store, &callback_url).await?;

    println!();
    println!(
        "✓ Logged in as {} (token: {})",
        creds.username,
        jwt::mask(&creds.access_token)
    );
    println!("  Session saved to: {}", paths::session_path().display());

    Ok(())
}

pub async fn callback(config: &Config, url: &str) -> Result<()> {
    let client = auth_client(config)?;
    let store = session_store(config)?;

    let creds = complete_oauth_callback(&client, &store, url).await?;

    println!(
        "✓ Logged in as {} (token: {})",
        creds.username,
        jwt::mask(&creds.access_token)
    );

    Ok(())
}

pub async fn signup(config: &Config, email: &str, name: Option<&str>) -> Result<()> {
    let client = auth_client(config)?;

    let name = match name {
        Some(name) => name.to_string(),
        None => prompt_line("Name: ")?,
    };
    let password = prompt_line("Password: ")?;
    if let Err(problems) = validate::validate_signup(email, &name, &password) {
        eprintln!("Invalid input:");
        print_problems(&problems);
        anyhow::bail!("signup input rejected");
    }

    let outcome = client.sign_up(email, &password, &[("name", &name)]).await?;

    if outcome.confirmed {
        println!("✓ Account created and ready. Log in with: keygate login {email}");
    } else {
        println!("✓ Account created (user: {})", outcome.user_sub);
        println!("  Check {email} for a verification code, then run:");
        println!("  keygate confirm {email} <CODE>");
    }

    Ok(())
}

pub async fn confirm(config: &Config, email: &str, code: &str) -> Result<()> {
    let client = auth_client(config)?;

    if let Err(problems) = validate::validate_confirmation_code(code) {
        eprintln!("Invalid input:");
        print_problems(&problems);
        anyhow::bail!("confirmation input rejected");
    }

    client.confirm_sign_up(email, code).await?;

    println!("✓ Account confirmed. Log in with: keygate login {email}");
    Ok(())
}

pub fn logout(config: &Config) -> Result<()> {
    let store = session_store(config)?;
    let had_session = store.clear()?;

    if had_session {
        println!("✓ Logged out");
        println!(
            "  Session removed from: {}",
            paths::session_path().display()
        );
    } else {
        println!("Not logged in (no session found).");
    }

    Ok(())
}

pub fn status(config: &Config) -> Result<()> {
    let store = session_store(config)?;

    match store.current_session() {
        Some(creds) => {
            println!("Logged in as {}", creds.username);
            println!("  Access token: {}", jwt::mask(&creds.access_token));
        }
        None => println!("Not logged in."),
    }

    Ok(())
}

/// Waits for the hosted UI to redirect the browser to the configured
/// localhost URI and returns the full callback URL.
fn wait_for_callback_url(redirect_uri: &str, timeout: Duration) -> Option<String> {
    let target = url::Url::parse(redirect_uri).ok()?;
    let port = target.port_or_known_default()?;
    let callback_path = target.path().to_string();

    let listener = match TcpListener::bind(format!("127.0.0.1:{port}")) {
        Ok(listener) => listener,
        Err(_) => return None,
    };
    let _ = listener.set_nonblocking(true);

    let (tx, rx) = std::sync::mpsc::channel::<Option<String>>();

    std::thread::spawn(move || {
        let start = std::time::Instant::now();
        loop {
            match listener.accept() {
                Ok((mut stream, _)) => {
                    let mut buffer = [0u8; 2048];
                    let _ = stream.read(&mut buffer);
                    let request = String::from_utf8_lossy(&buffer);
                    let callback = extract_callback_from_request(&request, &callback_path, port);
                    let response = match &callback {
                        Some(url) if parse_callback_url(url).is_ok() => success_response(),
                        _ => error_response(),
                    };
                    let _ = stream.write_all(response.as_bytes());
                    let _ = tx.send(callback);
                    break;
                }
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                    if start.elapsed() > timeout {
                        let _ = tx.send(None);
                        break;
                    }
                    std::thread::sleep(Duration::from_millis(100));
                }
                Err(_) => {
                    let _ = tx.send(None);
                    break;
                }
            }
        }
    });

    rx.recv_timeout(timeout + Duration::from_secs(1)).ok().flatten()
}

/// Rebuilds the full callback URL from an HTTP request line, so provider
/// error parameters survive alongside the code.
fn extract_callback_from_request(
    request: &str,
    callback_path: &str,
    port: u16,
) -> Option<String> {
    let request_line = request.lines().next()?;
    let mut parts = request_line.split_whitespace();
    let _method = parts.next()?;
    let path = parts.next()?;

    let url = url::Url::parse(&format!("http://localhost:{port}{path}")).ok()?;
    if url.path() != callback_path {
        return None;
    }
    Some(url.to_string())
}

fn success_response() -> String {
    let body = "<!doctype html><html><head><meta charset=\"utf-8\" /><title>Login successful</title></head><body><p>Login successful. Return to your terminal to continue.</p></body></html>";
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    )
}

fn error_response() -> String {
    let body = "Invalid login callback";
    format!(
        "HTTP/1.1 400 Bad Request\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    )
}
