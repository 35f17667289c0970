use portal::{
    AppState,
    account::{LoginRequest, SignUpRequest},
    config::Config,
    screen::ScreenState,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn usage() -> ! {
    eprintln!("usage:");
    eprintln!("  portal signup <full name> <email> <course> <year> <password>");
    eprintln!("  portal home <email> <password> [--logout]");
    std::process::exit(2);
}

fn render(state: &ScreenState) {
    match state {
        ScreenState::Unauthenticated => println!("-> login"),
        ScreenState::LoadingCache => println!("loading..."),
        ScreenState::Placeholder(p) => {
            println!("{} | Course: {} | Year Level: {}", p.name, p.course, p.year)
        }
        ScreenState::CacheHit(p) | ScreenState::Refreshed(p) => println!(
            "{} <{}> | Course: {} | Year Level: {} | Joined: {}",
            p.name,
            p.email,
            p.course,
            p.year,
            p.joined_date()
        ),
        ScreenState::LoggingOut { .. } => println!("logging out..."),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Config::from_env().expect("Failed to load configuration");
    let state = AppState::from_config(&config).expect("Failed to open profile store");

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("signup") if args.len() == 6 => {
            let req = SignUpRequest {
                full_name: args[1].clone(),
                email: args[2].clone(),
                course: args[3].clone(),
                year: args[4].clone(),
                password: args[5].clone(),
                confirm_password: args[5].clone(),
            };
            match state.accounts().sign_up(req).await {
                Ok(profile) => println!("Account created successfully for {}", profile.name),
                Err(e) => {
                    eprintln!("Sign Up Failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Some("home") if args.len() >= 3 => {
            let req = LoginRequest {
                email: args[1].clone(),
                password: args[2].clone(),
            };
            if let Err(e) = state.accounts().log_in(req).await {
                eprintln!("Login Failed: {}", e);
                std::process::exit(1);
            }

            let screen = state.profile_screen();
            let mut updates = screen.subscribe();
            let printer = async {
                while updates.changed().await.is_ok() {
                    render(&updates.borrow_and_update().clone());
                }
            };

            tokio::select! {
                _ = printer => {}
                _ = screen.watch_identity() => {}
                _ = async {
                    screen.mount().await;
                    if args.iter().any(|a| a == "--logout") {
                        if let Err(e) = screen.logout().await {
                            eprintln!("Logout Failed: {}", e);
                        }
                    }
                } => {}
            }

            render(&screen.state());
        }
        _ => usage(),
    }
}
