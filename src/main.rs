#[cfg(feature = "ssr")]
#[tokio::main]
async fn main() {
    use anniversary_draw::app::*;
    use anniversary_draw::config::AppConfig;
    use anniversary_draw::feed::{ChangeFeed, FeedQuery};
    use anniversary_draw::{build_pool, ensure_schema};
    use axum::{extract::Query, routing::get, Router};
    use leptos::logging::log;
    use leptos::prelude::*;
    use leptos_axum::{generate_route_list, LeptosRoutes};

    let config = AppConfig::from_env().expect("Invalid configuration");

    let pool = build_pool(&config.database_url).expect("Failed to create pool.");
    {
        let mut conn = pool.get().expect("Failed to get a connection from the pool.");
        ensure_schema(&mut conn).expect("Failed to create the database schema.");
    }
    let feed = ChangeFeed::new(config.feed_capacity);
    log!(
        "Prize plan {:?}, moderation {:?}",
        config.prize_plan,
        config.moderation_mode()
    );

    let conf = get_configuration(None).unwrap();
    let addr = conf.leptos_options.site_addr;
    let leptos_options = conf.leptos_options;
    // Generate the list of routes in your Leptos App
    let routes = generate_route_list(App);

    let leptos_options_clone = leptos_options.clone();
    let route_feed = feed.clone();
    let app = Router::new()
        .route(
            FEED_PATH,
            get(move |query: Query<FeedQuery>| sse::change_stream(route_feed.clone(), query)),
        )
        .leptos_routes_with_context(
            &leptos_options,
            routes,
            // Provide pool, change feed and settings for server functions.
            move || {
                provide_context(pool.clone());
                provide_context(feed.clone());
                provide_context(config.clone());
            },
            // Use App for main routes.
            move || shell(leptos_options_clone.clone()),
        )
        // Use shell for fallback.
        .fallback(leptos_axum::file_and_error_handler(shell))
        .with_state(leptos_options.clone());

    log!("listening on http://{}", &addr);
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, app.into_make_service())
        .await
        .unwrap();
}

#[cfg(feature = "ssr")]
mod sse {
    use std::convert::Infallible;
    use std::time::Duration;

    use anniversary_draw::feed::{ChangeFeed, FeedQuery};
    use axum::extract::Query;
    use axum::http::StatusCode;
    use axum::response::sse::{Event, KeepAlive, Sse};
    use futures_util::stream::{self, Stream};
    use leptos::logging::{log, warn};

    /// Streams every change matching the query as one JSON `data:` line per event.
    pub async fn change_stream(
        feed: ChangeFeed,
        Query(query): Query<FeedQuery>,
    ) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, (StatusCode, String)> {
        let filter = query
            .into_filter()
            .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
        log!("Feed subscriber joined for {}", filter.to_query());
        let subscription = feed.subscribe(filter);

        let events = stream::unfold(subscription, |mut subscription| async move {
            loop {
                let message = subscription.next().await?;
                match serde_json::to_string(&message) {
                    Ok(json) => return Some((Ok(Event::default().data(json)), subscription)),
                    Err(e) => warn!("Could not encode feed message: {}", e),
                }
            }
        });

        Ok(Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
    }
}

#[cfg(not(feature = "ssr"))]
pub fn main() {
    // no client-side main function
    // unless we want this to work with e.g., Trunk for pure client-side testing
    // see lib.rs for hydration function instead
}
