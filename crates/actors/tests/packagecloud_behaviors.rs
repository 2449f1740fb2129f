//! Behavioral tests for the packagecloud actors against a mock API.

use mockito::{Matcher, Mock, ServerGuard};
use serde_json::json;

use deckhand_actors::{Backends, PackagecloudSettings, Settings, builtin_registry};
use deckhand_core::{Error, ErrorKind, Result};
use deckhand_engine::{ActorRegistry, ActorSpec, ExecContext};

const BASIC_AUTH: &str = "Basic dDBrM246";

fn listing() -> String {
    json!([
        {
            "name": "api",
            "version": "1.2",
            "distro_version": "ubuntu/focal",
            "created_at": "2024-03-03T00:00:00.000Z",
            "package_html_url": "/acme/test/packages/ubuntu/focal/api_1.2.deb"
        },
        {
            "name": "api",
            "version": "1.0",
            "distro_version": "ubuntu/focal",
            "created_at": "2024-03-01T00:00:00.000Z",
            "package_html_url": "/acme/test/packages/ubuntu/focal/api_1.0.deb"
        },
        {
            "name": "api",
            "version": "1.1",
            "distro_version": "ubuntu/focal",
            "created_at": "2024-03-02T00:00:00.000Z",
            "package_html_url": "/acme/test/packages/ubuntu/focal/api_1.1.deb"
        },
        {
            "name": "worker",
            "version": "3.0",
            "distro_version": "el/7",
            "created_at": "2024-03-01T00:00:00.000Z",
            "package_html_url": "/acme/test/packages/el/7/worker-3.0.rpm"
        }
    ])
    .to_string()
}

fn registry(server: &ServerGuard) -> ActorRegistry {
    let settings = Settings {
        packagecloud: PackagecloudSettings::new("acme", "t0k3n").with_endpoint(server.url()),
        ..Settings::default()
    };
    builtin_registry(settings, &Backends::default())
}

async fn mock_listing(server: &mut ServerGuard, status: usize) -> Mock {
    server
        .mock("GET", "/repos/acme/test/packages.json")
        .match_query(Matcher::UrlEncoded("per_page".into(), i64::MAX.to_string()))
        .match_header("authorization", BASIC_AUTH)
        .with_status(status)
        .with_header("content-type", "application/json")
        .with_body(listing())
        .create_async()
        .await
}

async fn mock_delete(server: &mut ServerGuard, path: &str, hits: usize) -> Mock {
    server
        .mock("DELETE", path)
        .match_header("authorization", BASIC_AUTH)
        .with_status(200)
        .with_body("{}")
        .expect(hits)
        .create_async()
        .await
}

fn delete_spec(number_to_keep: u64) -> ActorSpec {
    ActorSpec::new("prune api", "packagecloud.Delete")
        .with_option("packages_to_delete", json!("api"))
        .with_option("repo", json!("test"))
        .with_option("number_to_keep", json!(number_to_keep))
}

#[tokio::test]
async fn given_three_versions_when_keeping_one_then_two_oldest_deleted() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let list = mock_listing(&mut server, 200).await;
    let oldest = mock_delete(&mut server, "/repos/acme/test/ubuntu/focal/api_1.0.deb", 1).await;
    let middle = mock_delete(&mut server, "/repos/acme/test/ubuntu/focal/api_1.1.deb", 1).await;
    let newest = mock_delete(&mut server, "/repos/acme/test/ubuntu/focal/api_1.2.deb", 0).await;

    let actor = registry(&server).build(&delete_spec(1), false)?;
    let result = actor.execute(&ExecContext::default()).await?;

    assert!(result);
    list.assert_async().await;
    oldest.assert_async().await;
    middle.assert_async().await;
    newest.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn given_dry_run_when_deleting_then_nothing_is_deleted() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let list = mock_listing(&mut server, 200).await;
    let any_delete = server
        .mock("DELETE", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let actor = registry(&server).build(&delete_spec(0), true)?;
    let result = actor.execute(&ExecContext::default()).await?;

    assert!(result);
    list.assert_async().await;
    any_delete.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn given_bad_token_when_listing_then_unrecoverable() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let _list = mock_listing(&mut server, 401).await;

    let actor = registry(&server).build(&delete_spec(0), false)?;
    let err = actor.execute(&ExecContext::default()).await.err();

    assert_eq!(err.map(|e| e.kind()), Some(ErrorKind::Unrecoverable));
    Ok(())
}

#[tokio::test]
async fn given_server_error_when_listing_then_operational() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let _list = mock_listing(&mut server, 503).await;

    let actor = registry(&server).build(&delete_spec(0), false)?;
    let err = actor.execute(&ExecContext::default()).await.err();

    assert!(err.is_some_and(|e| e.is_retryable()));
    Ok(())
}

#[tokio::test]
async fn given_matching_package_when_waiting_then_found_on_first_search() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let list = mock_listing(&mut server, 200).await;

    let spec = ActorSpec::new("wait for worker", "packagecloud.WaitForPackage")
        .with_option("name", json!("work"))
        .with_option("version", json!("3\\."))
        .with_option("repo", json!("test"));
    let actor = registry(&server).build(&spec, false)?;
    let result = actor.execute(&ExecContext::default()).await?;

    assert!(result);
    list.assert_async().await;
    Ok(())
}

#[test]
fn given_missing_token_when_building_then_configuration_error() {
    let settings = Settings {
        packagecloud: PackagecloudSettings {
            token: None,
            ..PackagecloudSettings::new("acme", "unused")
        },
        ..Settings::default()
    };
    let registry = builtin_registry(settings, &Backends::default());

    let err = registry.build(&delete_spec(0), false).err();

    assert!(matches!(err, Some(Error::MissingCredentials { .. })));
}

#[test]
fn given_invalid_regex_when_building_then_configuration_error() {
    let settings = Settings {
        packagecloud: PackagecloudSettings::new("acme", "t0k3n"),
        ..Settings::default()
    };
    let registry = builtin_registry(settings, &Backends::default());
    let spec = ActorSpec::new("wait", "packagecloud.WaitForPackage")
        .with_option("name", json!("[unclosed"))
        .with_option("repo", json!("test"));

    let err = registry.build(&spec, false).err();

    assert_eq!(err.map(|e| e.kind()), Some(ErrorKind::Configuration));
}

#[test]
fn given_delete_by_date_without_older_than_when_building_then_invalid_options() {
    let settings = Settings {
        packagecloud: PackagecloudSettings::new("acme", "t0k3n"),
        ..Settings::default()
    };
    let registry = builtin_registry(settings, &Backends::default());
    let spec = ActorSpec::new("prune", "packagecloud.DeleteByDate")
        .with_option("packages_to_delete", json!("api"))
        .with_option("repo", json!("test"));

    let err = registry.build(&spec, false).err();

    assert!(matches!(err, Some(Error::InvalidOptions { .. })));
}
