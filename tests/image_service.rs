use anyhow::Result;
use httpcat_bot::images::{FetchError, ImageService};

const CAT_JPEG: &[u8] = b"\xff\xd8\xff\xe0not-really-a-cat";

#[tokio::test]
async fn test_second_query_is_a_cache_hit() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/404.jpg")
        .with_status(200)
        .with_header("content-type", "image/jpeg")
        .with_body(CAT_JPEG)
        .expect(1)
        .create_async()
        .await;

    let images = ImageService::new(&server.url());

    let first = images.get(404).await?;
    let second = images.get(404).await?;

    // One network fetch, byte-identical replies
    assert_eq!(first.bytes, second.bytes);
    assert_eq!(first.bytes.as_ref(), CAT_JPEG);
    assert_eq!(first.file_name(), "404.jpg");
    mock.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn test_provider_error_is_not_cached() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let miss = server
        .mock("GET", "/999.jpg")
        .with_status(404)
        .with_body("no cat here")
        .expect(1)
        .create_async()
        .await;

    let images = ImageService::new(&server.url());

    match images.get(999).await {
        Err(FetchError::UpstreamStatus { status: 404, .. }) => {}
        other => panic!("expected an upstream 404, got {other:?}"),
    }
    miss.assert_async().await;

    // The failure left no entry behind, so the next query fetches again
    // and can succeed once the provider recovers
    let hit = server
        .mock("GET", "/999.jpg")
        .with_status(200)
        .with_body(CAT_JPEG)
        .expect(1)
        .create_async()
        .await;

    let image = images.get(999).await?;
    assert_eq!(image.bytes.as_ref(), CAT_JPEG);
    hit.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn test_concurrent_queries_share_one_download() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/503.jpg")
        .with_status(200)
        .with_body(CAT_JPEG)
        .expect(1)
        .create_async()
        .await;

    let images = ImageService::new(&server.url());

    let (a, b, c) = tokio::join!(images.get(503), images.get(503), images.get(503));
    let (a, b, c) = (a?, b?, c?);

    assert_eq!(a.bytes, b.bytes);
    assert_eq!(b.bytes, c.bytes);
    mock.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn test_unreachable_provider_maps_to_network_error() {
    // Nothing listens on port 9; the connection is refused outright
    let images = ImageService::new("http://127.0.0.1:9");

    match images.get(200).await {
        Err(FetchError::Network(_)) => {}
        other => panic!("expected a network error, got {other:?}"),
    }
}
