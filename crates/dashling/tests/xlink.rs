use std::time::Duration;

use dashling::{DashSession, HttpFetch};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_test_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn period_ids(session: &DashSession) -> Vec<String> {
    session
        .timeline()
        .periods()
        .iter()
        .map(|stream_period| {
            session.mpd().periods[stream_period.index]
                .id
                .clone()
                .unwrap_or_default()
        })
        .collect()
}

#[tokio::test]
async fn on_load_periods_are_fetched_and_spliced_in_document_order() -> anyhow::Result<()> {
    init_test_tracing();
    let server = MockServer::start().await;

    // A rootless fragment with two sibling Periods.
    Mock::given(method("GET"))
        .and(path("/periods.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<Period id="mid1" duration="PT5S"/>
               <Period id="mid2" duration="PT10S"/>"#,
        ))
        .mount(&server)
        .await;

    let manifest = format!(
        r#"<MPD type="static" mediaPresentationDuration="PT30S"
                xmlns:xlink="http://www.w3.org/1999/xlink">
             <Period id="head" duration="PT10S"/>
             <Period xlink:href="{}/periods.xml" xlink:actuate="onLoad"/>
             <Period id="tail"/>
           </MPD>"#,
        server.uri()
    );
    let manifest_url = Url::parse(&format!("{}/manifest.mpd", server.uri()))?;

    let mut session = DashSession::parse(manifest.as_bytes(), manifest_url)?;
    session.resolve_external(&HttpFetch::default()).await?;

    assert_eq!(period_ids(&session), vec!["head", "mid1", "mid2", "tail"]);

    let starts: Vec<Duration> = session
        .timeline()
        .periods()
        .iter()
        .map(|period| period.start)
        .collect();
    assert_eq!(
        starts,
        vec![
            Duration::ZERO,
            Duration::from_secs(10),
            Duration::from_secs(15),
            Duration::from_secs(25),
        ]
    );
    assert_eq!(
        session.timeline().get(3).unwrap().duration,
        Some(Duration::from_secs(5))
    );
    Ok(())
}

#[tokio::test]
async fn resolve_to_zero_removes_the_period() {
    let manifest = r#"<MPD type="static" mediaPresentationDuration="PT20S"
                           xmlns:xlink="http://www.w3.org/1999/xlink">
          <Period id="a" duration="PT10S"/>
          <Period xlink:href="urn:mpeg:dash:resolve-to-zero:2013" xlink:actuate="onLoad"/>
          <Period id="b"/>
        </MPD>"#;
    let manifest_url = Url::parse("https://example.com/manifest.mpd").unwrap();

    let mut session = DashSession::parse(manifest.as_bytes(), manifest_url).unwrap();
    // The sentinel never touches the network, so no server is mounted.
    session.resolve_external(&HttpFetch::default()).await.unwrap();

    assert_eq!(period_ids(&session), vec!["a", "b"]);
    // The chain is computed as if the removed Period never existed.
    assert_eq!(
        session.timeline().get(1).unwrap().start,
        Duration::from_secs(10)
    );
    assert_eq!(
        session.timeline().get(1).unwrap().duration,
        Some(Duration::from_secs(10))
    );
}

#[tokio::test]
async fn failed_fetch_drops_the_placeholder_and_keeps_siblings() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.xml"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let manifest = format!(
        r#"<MPD type="static" mediaPresentationDuration="PT20S"
                xmlns:xlink="http://www.w3.org/1999/xlink">
             <Period id="a" duration="PT10S"/>
             <Period xlink:href="{}/missing.xml" xlink:actuate="onLoad"/>
             <Period id="b"/>
           </MPD>"#,
        server.uri()
    );
    let manifest_url = Url::parse(&format!("{}/manifest.mpd", server.uri())).unwrap();

    let mut session = DashSession::parse(manifest.as_bytes(), manifest_url).unwrap();
    session.resolve_external(&HttpFetch::default()).await.unwrap();

    assert_eq!(period_ids(&session), vec!["a", "b"]);
}

#[tokio::test]
async fn on_request_references_are_left_alone_by_the_batch_pass() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/deferred.xml"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"<Period id="deferred" duration="PT5S"/>"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let manifest = format!(
        r#"<MPD type="static" mediaPresentationDuration="PT15S"
                xmlns:xlink="http://www.w3.org/1999/xlink">
             <Period id="a" duration="PT10S"/>
             <Period xlink:href="{}/deferred.xml" xlink:actuate="onRequest"/>
           </MPD>"#,
        server.uri()
    );
    let manifest_url = Url::parse(&format!("{}/manifest.mpd", server.uri())).unwrap();

    let mut session = DashSession::parse(manifest.as_bytes(), manifest_url).unwrap();
    let fetcher = HttpFetch::default();

    // The on-load pass must not touch an onRequest reference.
    session.resolve_external(&fetcher).await.unwrap();
    assert_eq!(period_ids(&session), vec!["a"]);
    assert!(session.mpd().periods[1].is_placeholder());

    // An explicit request resolves it individually.
    session.resolve_period_reference(1, &fetcher).await.unwrap();
    assert_eq!(period_ids(&session), vec!["a", "deferred"]);
    assert_eq!(
        session.timeline().get(1).unwrap().start,
        Duration::from_secs(10)
    );
}

#[tokio::test]
async fn segment_list_reference_is_fetched_just_in_time() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/list.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<SegmentList timescale="1" duration="2">
                 <SegmentURL media="x1.m4s"/>
                 <SegmentURL media="x2.m4s"/>
               </SegmentList>"#,
        ))
        .mount(&server)
        .await;

    let manifest = format!(
        r#"<MPD type="static" mediaPresentationDuration="PT4S"
                xmlns:xlink="http://www.w3.org/1999/xlink">
             <Period>
               <AdaptationSet>
                 <Representation id="a" bandwidth="1">
                   <SegmentList xlink:href="{}/list.xml" xlink:actuate="onRequest"
                                timescale="1" duration="2"/>
                 </Representation>
               </AdaptationSet>
             </Period>
           </MPD>"#,
        server.uri()
    );
    let manifest_url = Url::parse(&format!("{}/manifest.mpd", server.uri())).unwrap();

    let mut session = DashSession::parse(manifest.as_bytes(), manifest_url).unwrap();
    let stream = session
        .setup_streaming_fetched(0, 0, &HttpFetch::default())
        .await
        .unwrap();

    let fragment = session.next_fragment(stream).unwrap().unwrap();
    assert!(fragment.uri.as_str().ends_with("/x1.m4s"));
    assert_eq!(session.active_stream(stream).unwrap().segment_count(), Some(2));
}

#[tokio::test]
async fn on_load_adaptation_set_reference() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/audio.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<AdaptationSet contentType="audio">
                 <SegmentTemplate media="audio/$Number$.m4s" timescale="1" duration="2"/>
                 <Representation id="a0" bandwidth="64000"/>
               </AdaptationSet>"#,
        ))
        .mount(&server)
        .await;

    let manifest = format!(
        r#"<MPD type="static" mediaPresentationDuration="PT10S"
                xmlns:xlink="http://www.w3.org/1999/xlink">
             <Period>
               <AdaptationSet contentType="video">
                 <SegmentTemplate media="video/$Number$.m4s" timescale="1" duration="2"/>
                 <Representation id="v0" bandwidth="100"/>
               </AdaptationSet>
               <AdaptationSet xlink:href="{}/audio.xml" xlink:actuate="onLoad"/>
             </Period>
           </MPD>"#,
        server.uri()
    );
    let manifest_url = Url::parse(&format!("{}/manifest.mpd", server.uri())).unwrap();

    let mut session = DashSession::parse(manifest.as_bytes(), manifest_url).unwrap();
    session.resolve_external(&HttpFetch::default()).await.unwrap();

    let sets = session.adaptation_sets().unwrap();
    assert_eq!(sets.len(), 2);
    assert_eq!(sets[1].content_type.as_deref(), Some("audio"));
    assert_eq!(sets[1].representations[0].id, "a0");
}
