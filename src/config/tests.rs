use super::*;

#[test]
fn defaults_match_documented_values() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.addr.to_string(), "127.0.0.1:3000");
    assert_eq!(settings.auth.session_cookie, "chirp_session");
    assert_eq!(settings.posts.max_content_chars.get(), 280);
    assert_eq!(settings.posts.feed_limit.get(), 100);
    assert_eq!(settings.posts.rate_limit_window, Duration::from_secs(60));
    assert_eq!(settings.posts.rate_limit_max_posts.get(), 3);
    assert_eq!(settings.query_cache.stale_after, Duration::from_secs(30));
    assert!(matches!(settings.logging.format, LogFormat::Compact));
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());
    raw.database.url = Some("postgres://from-file".to_string());

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        database: DatabaseOverride {
            database_url: Some("postgres://from-cli".to_string()),
        },
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert_eq!(settings.database.url.as_deref(), Some("postgres://from-cli"));
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn zero_rate_limit_is_rejected() {
    let mut raw = RawSettings::default();
    raw.posts.rate_limit_max_posts = Some(0);

    let err = Settings::from_raw(raw).expect_err("zero posts per window");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "posts.rate_limit_max_posts",
            ..
        }
    ));
}

#[test]
fn blank_database_url_is_treated_as_missing() {
    let mut raw = RawSettings::default();
    raw.database.url = Some("   ".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.database.url.is_none());
}

#[test]
fn bad_cookie_name_is_rejected() {
    let mut raw = RawSettings::default();
    raw.auth.session_cookie = Some("chirp session".to_string());
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["chirp"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_users_create_arguments() {
    let args = CliArgs::parse_from([
        "chirp",
        "users",
        "create",
        "--username",
        "ada",
        "--profile-image-url",
        "https://img.example/ada.png",
        "--database-url",
        "postgres://example",
    ]);

    match args.command.expect("users command") {
        Command::Users(users) => match users.command {
            UsersCommand::Create(create) => {
                assert_eq!(create.username, "ada");
                assert_eq!(create.profile_image_url, "https://img.example/ada.png");
                assert_eq!(
                    create.database.database_url.as_deref(),
                    Some("postgres://example")
                );
            }
        },
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_sessions_issue_arguments() {
    let args = CliArgs::parse_from(["chirp", "sessions", "issue", "--username", "ada", "--ttl-hours", "2"]);

    match args.command.expect("sessions command") {
        Command::Sessions(sessions) => match sessions.command {
            SessionsCommand::Issue(issue) => {
                assert_eq!(issue.username, "ada");
                assert_eq!(issue.ttl_hours, Some(2));
            }
            SessionsCommand::Revoke(_) => panic!("parsed revoke instead of issue"),
        },
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_sessions_revoke_arguments() {
    let args = CliArgs::parse_from([
        "chirp",
        "sessions",
        "revoke",
        "cs_abcd1234_secret",
        "--database-url",
        "postgres://example",
    ]);

    match args.command.expect("sessions command") {
        Command::Sessions(sessions) => match sessions.command {
            SessionsCommand::Revoke(revoke) => {
                assert_eq!(revoke.token, "cs_abcd1234_secret");
                assert_eq!(
                    revoke.database.database_url.as_deref(),
                    Some("postgres://example")
                );
            }
            SessionsCommand::Issue(_) => panic!("parsed issue instead of revoke"),
        },
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_prerender_arguments() {
    let args = CliArgs::parse_from(["chirp", "prerender", "/tmp/index.html"]);

    match args.command.expect("prerender command") {
        Command::Prerender(prerender) => {
            assert_eq!(prerender.file, std::path::Path::new("/tmp/index.html"));
        }
        _ => panic!("wrong command parsed"),
    }
}
