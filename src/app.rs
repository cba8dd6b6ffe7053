use leptos::ev::SubmitEvent;
use leptos::logging::{log, warn};
use leptos::prelude::*;
use leptos::server_fn::error::NoCustomError;
use leptos::task::spawn_local;
use leptos_meta::{provide_meta_context, MetaTags, Stylesheet, Title};
use leptos_router::{
    components::{Route, Router, Routes},
    hooks::{use_navigate, use_query_map},
    path, NavigateOptions,
};
use std::collections::HashMap;
#[cfg(feature = "hydrate")]
use std::rc::Rc;

use crate::blessing::{apply_blessing_event, validate_blessing, MAX_BLESSING_CHARS, MIN_BLESSING_CHARS};
#[cfg(not(feature = "hydrate"))]
use crate::device::MemoryCache as DeviceCache;
#[cfg(feature = "hydrate")]
use crate::device::BrowserStorage as DeviceCache;
use crate::device::{DeviceIdentity, HostTicket, PlayerTicket};
use crate::draw::DrawOutcome;
use crate::feed::{ChangeEvent, ChangeFilter, FeedMessage, Table};
use crate::model::{
    Blessing, GameSession, Player, PlayerResult, Scoreboard, SessionStatus, WinnerTier,
};
use crate::scoreboard::{leader, ScoreChange, Team};
use crate::scratch::{CoverTheme, ScratchCard, ScratchConfig, ScratchEffect, DEFAULT_THRESHOLD_PERCENT};
use crate::sync::{session_filters, ActivationTicket, SessionView, SyncOutcome};
use crate::words::{ranked, sphere_layout, word_frequencies};

#[cfg(feature = "ssr")]
use crate::config::AppConfig;
#[cfg(feature = "ssr")]
use crate::draw::HostAuthority;
#[cfg(feature = "ssr")]
use crate::error::AppError;
#[cfg(feature = "ssr")]
use crate::feed::ChangeFeed;
#[cfg(feature = "ssr")]
use crate::DbPool;
#[cfg(feature = "ssr")]
use diesel::SqliteConnection;

/// Path of the server-sent change feed.
pub const FEED_PATH: &str = "/api/feed";

const GENERIC_FAILURE: &str = "Something went wrong. Please try again.";
#[cfg(feature = "hydrate")]
const TOAST_MILLIS: u32 = 4_000;

// ---------------------------------------------------------------------------------------------
// Server functions
// ---------------------------------------------------------------------------------------------

// Converts an application error for the client. Backend details stay in the server log.
#[cfg(feature = "ssr")]
fn server_error(err: AppError) -> ServerFnError<NoCustomError> {
    if let AppError::Backend(detail) = &err {
        leptos::logging::error!("Backend failure: {}", detail);
        return ServerFnError::ServerError(GENERIC_FAILURE.to_string());
    }
    ServerFnError::ServerError(err.to_string())
}

// Runs blocking diesel work on a pooled connection.
#[cfg(feature = "ssr")]
async fn with_conn<T, F>(work: F) -> Result<T, ServerFnError<NoCustomError>>
where
    T: Send + 'static,
    F: FnOnce(&mut SqliteConnection) -> Result<T, AppError> + Send + 'static,
{
    let pool: DbPool = expect_context();
    let result = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get().map_err(AppError::from)?;
        work(&mut conn)
    })
    .await;
    match result {
        Ok(value) => value.map_err(server_error),
        Err(e) => Err(server_error(AppError::Backend(e.to_string()))),
    }
}

#[cfg(feature = "ssr")]
fn publish(events: impl IntoIterator<Item = ChangeEvent>) {
    let feed: ChangeFeed = expect_context();
    feed.publish_all(events);
}

#[cfg(feature = "ssr")]
async fn cookie_value(name: &str) -> Result<Option<String>, ServerFnError<NoCustomError>> {
    use axum::http::HeaderMap;
    use leptos_axum::extract;

    let headers: HeaderMap = extract()
        .await
        .map_err(|e| ServerFnError::<NoCustomError>::ServerError(e.to_string()))?;

    let prefix = format!("{name}=");
    if let Some(cookie_header) = headers.get(axum::http::header::COOKIE) {
        if let Ok(cookie_str) = cookie_header.to_str() {
            for cookie in cookie_str.split(';') {
                if let Some(value) = cookie.trim().strip_prefix(prefix.as_str()) {
                    return Ok(Some(value.to_string()));
                }
            }
        }
    }
    Ok(None)
}

// Returns None when no admin cookie is present, otherwise whether its token is valid.
#[cfg(feature = "ssr")]
async fn extract_and_validate_admin_token() -> Result<Option<bool>, ServerFnError<NoCustomError>> {
    match cookie_value("admin_token").await? {
        Some(token) => {
            with_conn(move |conn| crate::validate_admin_token(conn, &token))
                .await
                .map(Some)
        }
        None => Ok(None),
    }
}

// Returns an empty result if the current request is from an admin, or an error otherwise.
#[cfg(feature = "ssr")]
async fn check_admin() -> Result<(), ServerFnError<NoCustomError>> {
    match extract_and_validate_admin_token().await? {
        Some(true) => Ok(()),
        _ => Err(server_error(AppError::Unauthorized)),
    }
}

// A host code authorises the call; without one the caller must be an admin.
#[cfg(feature = "ssr")]
async fn host_authority(
    host_code: Option<String>,
) -> Result<HostAuthority, ServerFnError<NoCustomError>> {
    match host_code {
        Some(code) if !code.trim().is_empty() => Ok(HostAuthority::Code(code)),
        _ => {
            check_admin().await?;
            Ok(HostAuthority::Admin)
        }
    }
}

// Checks if the current request is from an admin. Returns true if it is, false otherwise.
#[server(IsAdmin)]
pub async fn is_admin() -> Result<bool, ServerFnError<NoCustomError>> {
    Ok(extract_and_validate_admin_token().await?.unwrap_or(false))
}

#[server(AdminLogin)]
pub async fn admin_login(password: String) -> Result<(), ServerFnError<NoCustomError>> {
    let config: AppConfig = expect_context();
    if password != config.admin_password {
        return Err(ServerFnError::ServerError("Invalid password".to_string()));
    }

    let token = with_conn(crate::create_admin_session).await?;

    use leptos_axum::ResponseOptions;
    let resp: ResponseOptions = expect_context();
    let cookie = format!(
        "admin_token={}; Max-Age=86400; Path=/; HttpOnly; SameSite=Strict",
        token
    );
    resp.insert_header(
        axum::http::header::SET_COOKIE,
        axum::http::HeaderValue::from_str(&cookie)
            .map_err(|e| ServerFnError::<NoCustomError>::ServerError(e.to_string()))?,
    );
    log!("Admin logged in");
    Ok(())
}

#[server(AdminLogout)]
pub async fn admin_logout() -> Result<(), ServerFnError<NoCustomError>> {
    if let Some(token) = cookie_value("admin_token").await? {
        with_conn(move |conn| crate::delete_admin_session(conn, &token)).await?;
    }

    use leptos_axum::ResponseOptions;
    let resp: ResponseOptions = expect_context();
    let cookie = "admin_token=; Max-Age=0; Path=/; HttpOnly; SameSite=Strict";
    resp.insert_header(
        axum::http::header::SET_COOKIE,
        axum::http::HeaderValue::from_str(cookie)
            .map_err(|e| ServerFnError::<NoCustomError>::ServerError(e.to_string()))?,
    );
    Ok(())
}

#[server(CreateSession)]
pub async fn create_session_handler(
    code: Option<String>,
) -> Result<GameSession, ServerFnError<NoCustomError>> {
    let session = with_conn(move |conn| {
        let mut rng = rand::rng();
        crate::create_session(conn, code.as_deref(), &mut rng)
    })
    .await?;
    log!("Created session {} with code {}", session.id, session.code);
    publish([ChangeEvent::SessionInserted(session.clone())]);
    Ok(session)
}

#[server(GetSession)]
pub async fn get_session_handler(
    session_id: i32,
) -> Result<GameSession, ServerFnError<NoCustomError>> {
    with_conn(move |conn| crate::get_session(conn, session_id)).await
}

#[server(GetRoster)]
pub async fn get_roster_handler(
    session_id: i32,
) -> Result<Vec<Player>, ServerFnError<NoCustomError>> {
    with_conn(move |conn| crate::get_roster(conn, session_id)).await
}

#[server(GetLiveSessions)]
pub async fn get_live_sessions_handler() -> Result<Vec<GameSession>, ServerFnError<NoCustomError>>
{
    check_admin().await?;
    with_conn(crate::get_live_sessions).await
}

#[server(GetJoinQr)]
pub async fn get_join_qr_handler(code: String) -> Result<String, ServerFnError<NoCustomError>> {
    use axum::http::HeaderMap;
    use leptos_axum::extract;

    let headers: HeaderMap = extract()
        .await
        .map_err(|e| ServerFnError::<NoCustomError>::ServerError(e.to_string()))?;
    let host = headers
        .get(axum::http::header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost:3000");
    let code = crate::normalize_session_code(&code).map_err(server_error)?;
    crate::join_qr_svg(&crate::join_url(&format!("http://{host}"), &code)).map_err(server_error)
}

#[server(JoinSession)]
pub async fn join_session_handler(
    code: String,
    name: String,
    device_id: String,
) -> Result<(GameSession, Player), ServerFnError<NoCustomError>> {
    let (session, player) =
        with_conn(move |conn| crate::join_session(conn, &code, &name, &device_id)).await?;
    log!("{} joined session {}", player.name, session.id);
    publish([ChangeEvent::PlayerInserted(player.clone())]);
    Ok((session, player))
}

#[server(LeaveSession)]
pub async fn leave_session_handler(
    player_id: i32,
    device_id: String,
) -> Result<(), ServerFnError<NoCustomError>> {
    let player = with_conn(move |conn| crate::leave_session(conn, player_id, &device_id)).await?;
    publish([ChangeEvent::PlayerDeleted {
        id: player.id,
        session_id: player.session_id,
    }]);
    Ok(())
}

#[server(GetPlayerResult)]
pub async fn get_player_result_handler(
    player_id: i32,
    device_id: String,
) -> Result<PlayerResult, ServerFnError<NoCustomError>> {
    with_conn(move |conn| crate::get_player_result(conn, player_id, &device_id)).await
}

#[server(StartGame)]
pub async fn start_game_handler(
    session_id: i32,
    host_code: Option<String>,
) -> Result<DrawOutcome, ServerFnError<NoCustomError>> {
    let authority = host_authority(host_code).await?;
    let config: AppConfig = expect_context();
    let plan = config.prize_plan;

    let (outcome, session, winners) = with_conn(move |conn| {
        let mut rng = rand::rng();
        let outcome =
            crate::start_game_in_transaction(conn, session_id, &authority, plan, &mut rng)?;
        let session = crate::get_session(conn, session_id)?;
        let winners: Vec<Player> = crate::get_roster(conn, session_id)?
            .into_iter()
            .filter(|p| p.is_winner)
            .collect();
        Ok((outcome, session, winners))
    })
    .await?;

    // Winner rows first, so a client reacting to the status change reads final results.
    publish(
        winners
            .into_iter()
            .map(ChangeEvent::PlayerUpdated)
            .chain([ChangeEvent::SessionUpdated(session)]),
    );
    Ok(outcome)
}

#[server(EndGame)]
pub async fn end_game_handler(
    session_id: i32,
    host_code: Option<String>,
) -> Result<GameSession, ServerFnError<NoCustomError>> {
    let authority = host_authority(host_code).await?;
    let session = with_conn(move |conn| crate::end_game(conn, session_id, &authority)).await?;
    log!("Session {} ended", session.id);
    publish([ChangeEvent::SessionUpdated(session.clone())]);
    Ok(session)
}

#[server(SubmitBlessing)]
pub async fn submit_blessing_handler(
    message: String,
) -> Result<Blessing, ServerFnError<NoCustomError>> {
    let config: AppConfig = expect_context();
    let mode = config.moderation_mode();
    let moderator = config.moderator();
    let blessing =
        with_conn(move |conn| crate::submit_blessing(conn, &message, mode, &moderator)).await?;
    publish([ChangeEvent::BlessingInserted(blessing.clone())]);
    Ok(blessing)
}

#[server(GetBlessings)]
pub async fn get_blessings_handler() -> Result<Vec<Blessing>, ServerFnError<NoCustomError>> {
    with_conn(crate::get_all_blessings).await
}

#[server(DeleteBlessing)]
pub async fn delete_blessing_handler(
    blessing_id: i32,
) -> Result<(), ServerFnError<NoCustomError>> {
    check_admin().await?;
    with_conn(move |conn| crate::delete_blessing(conn, blessing_id)).await?;
    publish([ChangeEvent::BlessingDeleted { id: blessing_id }]);
    Ok(())
}

#[server(GetScoreboard)]
pub async fn get_scoreboard_handler() -> Result<Scoreboard, ServerFnError<NoCustomError>> {
    with_conn(crate::get_current_scoreboard).await
}

#[server(AdjustScore)]
pub async fn adjust_score_handler(
    team: Team,
    delta: i32,
) -> Result<Scoreboard, ServerFnError<NoCustomError>> {
    check_admin().await?;
    let board = with_conn(move |conn| crate::adjust_team_score(conn, team, delta)).await?;
    publish([ChangeEvent::ScoreboardUpdated(board.clone())]);
    Ok(board)
}

#[server(RenameTeams)]
pub async fn rename_teams_handler(
    team1_name: String,
    team2_name: String,
) -> Result<Scoreboard, ServerFnError<NoCustomError>> {
    check_admin().await?;
    let board =
        with_conn(move |conn| crate::rename_teams(conn, &team1_name, &team2_name)).await?;
    publish([ChangeEvent::ScoreboardUpdated(board.clone())]);
    Ok(board)
}

/// The message to show a user for a failed server call.
pub fn error_message(err: &ServerFnError<NoCustomError>) -> String {
    match err {
        ServerFnError::ServerError(message) => message.clone(),
        _ => GENERIC_FAILURE.to_string(),
    }
}

fn device_identity() -> DeviceIdentity<DeviceCache> {
    DeviceIdentity::new(DeviceCache::default())
}

// ---------------------------------------------------------------------------------------------
// Toasts
// ---------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Error,
    Info,
}

impl ToastKind {
    fn class(&self) -> &'static str {
        match self {
            ToastKind::Success => "toast success",
            ToastKind::Error => "toast error",
            ToastKind::Info => "toast info",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Toast {
    id: u64,
    kind: ToastKind,
    text: String,
}

/// Transient notifications. Each toast dismisses itself after a few seconds; pending timers are
/// cancelled when the stack unmounts.
#[derive(Clone, Copy)]
pub struct Toaster {
    toasts: RwSignal<Vec<Toast>>,
    next_id: StoredValue<u64>,
    #[cfg(feature = "hydrate")]
    timers: StoredValue<HashMap<u64, gloo_timers::callback::Timeout>, LocalStorage>,
}

impl Toaster {
    fn new() -> Self {
        Self {
            toasts: RwSignal::new(Vec::new()),
            next_id: StoredValue::new(0),
            #[cfg(feature = "hydrate")]
            timers: StoredValue::new_local(HashMap::new()),
        }
    }

    pub fn push(&self, kind: ToastKind, text: impl Into<String>) {
        let Some(id) = self.next_id.try_update_value(|n| {
            *n += 1;
            *n
        }) else {
            return;
        };
        self.toasts.try_update(|toasts| {
            toasts.push(Toast {
                id,
                kind,
                text: text.into(),
            })
        });

        #[cfg(feature = "hydrate")]
        {
            let toasts = self.toasts;
            let timeout = gloo_timers::callback::Timeout::new(TOAST_MILLIS, move || {
                toasts.try_update(|toasts| toasts.retain(|t| t.id != id));
            });
            let live: Vec<u64> = self
                .toasts
                .try_with_untracked(|toasts| toasts.iter().map(|t| t.id).collect())
                .unwrap_or_default();
            self.timers.try_update_value(|timers| {
                // Fired timers are dropped here, never from inside their own callback.
                timers.retain(|id, _| live.contains(id));
                timers.insert(id, timeout);
            });
        }
    }

    pub fn success(&self, text: impl Into<String>) {
        self.push(ToastKind::Success, text);
    }

    pub fn error(&self, text: impl Into<String>) {
        self.push(ToastKind::Error, text);
    }

    pub fn info(&self, text: impl Into<String>) {
        self.push(ToastKind::Info, text);
    }

    fn dismiss(&self, id: u64) {
        self.toasts.update(|toasts| toasts.retain(|t| t.id != id));
        #[cfg(feature = "hydrate")]
        self.timers.try_update_value(|timers| timers.remove(&id));
    }

    fn cancel_timers(&self) {
        #[cfg(feature = "hydrate")]
        self.timers.try_update_value(|timers| timers.clear());
    }
}

fn use_toaster() -> Toaster {
    expect_context::<Toaster>()
}

#[component]
fn ToastStack() -> impl IntoView {
    let toaster = use_toaster();
    on_cleanup(move || toaster.cancel_timers());

    view! {
        <div class="toast-stack">
            <For
                each=move || toaster.toasts.get()
                key=|toast| toast.id
                children=move |toast: Toast| {
                    let id = toast.id;
                    view! {
                        <div class=toast.kind.class() role="status">
                            <span>{toast.text}</span>
                            <button on:click=move |_| toaster.dismiss(id)>"×"</button>
                        </div>
                    }
                }
            />
        </div>
    }
}

// ---------------------------------------------------------------------------------------------
// Live updates
// ---------------------------------------------------------------------------------------------

// One open EventSource. Dropping it closes the stream.
#[cfg(feature = "hydrate")]
struct FeedConnection {
    source: web_sys::EventSource,
    _on_message: wasm_bindgen::closure::Closure<dyn FnMut(web_sys::MessageEvent)>,
    _on_open: wasm_bindgen::closure::Closure<dyn FnMut(web_sys::Event)>,
}

#[cfg(feature = "hydrate")]
impl FeedConnection {
    fn open(filter: &ChangeFilter, deliver: Rc<dyn Fn(FeedMessage)>) -> Option<Self> {
        use std::cell::Cell;
        use wasm_bindgen::closure::Closure;
        use wasm_bindgen::JsCast;

        let url = format!("{FEED_PATH}?{}", filter.to_query());
        let source = match web_sys::EventSource::new(&url) {
            Ok(source) => source,
            Err(e) => {
                warn!("Could not open change feed {}: {:?}", url, e);
                return None;
            }
        };

        let on_event = deliver.clone();
        let on_message = Closure::<dyn FnMut(web_sys::MessageEvent)>::new(
            move |event: web_sys::MessageEvent| {
                let Some(text) = event.data().as_string() else {
                    return;
                };
                match serde_json::from_str::<FeedMessage>(&text) {
                    Ok(message) => on_event(message),
                    Err(e) => warn!("Ignoring malformed feed message: {}", e),
                }
            },
        );
        source.set_onmessage(Some(on_message.as_ref().unchecked_ref()));

        // The server subscribes before the stream opens, so a read started from here misses
        // nothing. The browser also reconnects on its own and anything sent meanwhile is gone.
        let opens = Cell::new(0u32);
        let on_open = Closure::<dyn FnMut(web_sys::Event)>::new(move |_event: web_sys::Event| {
            if opens.replace(opens.get() + 1) > 0 {
                log!("Change feed reconnected, resyncing");
            }
            deliver(FeedMessage::opened());
        });
        source.set_onopen(Some(on_open.as_ref().unchecked_ref()));

        Some(Self {
            source,
            _on_message: on_message,
            _on_open: on_open,
        })
    }
}

#[cfg(feature = "hydrate")]
impl Drop for FeedConnection {
    fn drop(&mut self) {
        self.source.set_onmessage(None);
        self.source.set_onopen(None);
        self.source.close();
    }
}

/// Subscribes to the change feed for the filters returned by `filters`, resubscribing whenever
/// they change and unsubscribing when the calling component is torn down. Does nothing on the
/// server.
fn use_change_feed<F, H>(filters: F, on_message: H)
where
    F: Fn() -> Vec<ChangeFilter> + 'static,
    H: Fn(FeedMessage) + 'static,
{
    #[cfg(feature = "hydrate")]
    {
        let on_message: Rc<dyn Fn(FeedMessage)> = Rc::new(on_message);
        let connections = StoredValue::new_local(Vec::<FeedConnection>::new());
        Effect::new(move || {
            let filters = filters();
            connections.update_value(|open| open.clear());
            let opened: Vec<FeedConnection> = filters
                .iter()
                .filter_map(|filter| FeedConnection::open(filter, on_message.clone()))
                .collect();
            connections.set_value(opened);
        });
        on_cleanup(move || {
            connections.try_update_value(|open| open.clear());
        });
    }
    #[cfg(not(feature = "hydrate"))]
    {
        let _ = (filters, on_message);
    }
}

fn load_snapshot(
    state: RwSignal<SessionView>,
    session_id: i32,
    ticket: ActivationTicket,
    toaster: Toaster,
) {
    spawn_local(async move {
        let session = get_session_handler(session_id).await;
        let roster = get_roster_handler(session_id).await;
        match (session, roster) {
            (Ok(session), Ok(roster)) => {
                let outcome = state.try_update(|view| view.apply_snapshot(ticket, Some(session), roster));
                if outcome == Some(SyncOutcome::RefetchRequired) {
                    resync(state, toaster);
                }
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!("Loading session {} failed: {}", session_id, e);
                state.try_update(|view| view.fail_snapshot(ticket));
                toaster.error(error_message(&e));
            }
        }
    });
}

// Re-reads the active session. The last snapshot stays visible until the new one lands.
fn resync(state: RwSignal<SessionView>, toaster: Toaster) {
    let Some(Some(session_id)) = state.try_with_untracked(|view| view.session_id()) else {
        return;
    };
    if let Some(Some(ticket)) = state.try_update(|view| view.refresh()) {
        load_snapshot(state, session_id, ticket, toaster);
    }
}

/// A live view of one session and its roster. Changing `session_id` drops the old view, ignores
/// its late reads, and moves the subscriptions.
fn use_session_view(session_id: Signal<Option<i32>>, toaster: Toaster) -> RwSignal<SessionView> {
    let state = RwSignal::new(SessionView::idle());

    Effect::new(move || {
        let id = session_id.get();
        let ticket = state.try_update(|view| view.activate(id));
        if let (Some(id), Some(ticket)) = (id, ticket) {
            load_snapshot(state, id, ticket, toaster);
        }
    });

    use_change_feed(
        move || {
            session_id
                .get()
                .map(|id| session_filters(id).to_vec())
                .unwrap_or_default()
        },
        move |message| match state.try_update(|view| view.apply_message(&message)) {
            Some(SyncOutcome::RefetchRequired) => resync(state, toaster),
            Some(outcome) if outcome.status_changed() => {
                if let SyncOutcome::SessionReplaced { current, .. } = outcome {
                    log!("Session is now {}", current);
                }
            }
            _ => {}
        },
    );

    on_cleanup(move || {
        state.try_update(|view| view.deactivate());
    });

    state
}

/// All blessings, newest first, kept current from the feed.
fn use_live_blessings(toaster: Toaster) -> RwSignal<Vec<Blessing>> {
    let blessings = RwSignal::new(Vec::<Blessing>::new());

    let reload = move || {
        spawn_local(async move {
            match get_blessings_handler().await {
                Ok(all) => {
                    blessings.try_set(all);
                }
                Err(e) => toaster.error(error_message(&e)),
            }
        });
    };

    Effect::new(move || reload());

    use_change_feed(
        || vec![ChangeFilter::table(Table::Blessings)],
        move |message| match message {
            FeedMessage::Event { event } => {
                blessings.try_update(|list| apply_blessing_event(list, &event));
            }
            FeedMessage::Resync { .. } => reload(),
        },
    );

    blessings
}

// ---------------------------------------------------------------------------------------------
// Shell and routes
// ---------------------------------------------------------------------------------------------

pub fn shell(options: LeptosOptions) -> impl IntoView {
    view! {
        <!DOCTYPE html>
        <html lang="en">
            <head>
                <meta charset="utf-8" />
                <meta name="viewport" content="width=device-width, initial-scale=1" />
                <AutoReload options=options.clone() />
                <HydrationScripts options />
                <MetaTags />
            </head>
            <body>
                <App />
            </body>
        </html>
    }
}

#[component]
pub fn App() -> impl IntoView {
    // Provides context that manages stylesheets, titles, meta tags, etc.
    provide_meta_context();
    provide_context(Toaster::new());

    view! {
        // id=leptos means cargo-leptos will hot-reload this stylesheet
        <Stylesheet id="leptos" href="/pkg/anniversary-draw.css" />

        <Title text="Anniversary Lucky Draw" />

        <Router>
            <main>
                <Routes fallback=|| "Page not found.".into_view()>
                    <Route path=path!("/") view=Home />
                    <Route path=path!("/host") view=HostPage />
                    <Route path=path!("/play") view=PlayerPage />
                    <Route path=path!("/blessings") view=BlessingsPage />
                    <Route path=path!("/cloud") view=WordCloudPage />
                    <Route path=path!("/scoreboard") view=ScoreboardPage />
                    <Route path=path!("/admin/login") view=AdminLogin />
                    <Route path=path!("/admin") view=AdminDashboard />
                </Routes>
            </main>
            <ToastStack />
        </Router>
    }
}

// ---------------------------------------------------------------------------------------------
// Join
// ---------------------------------------------------------------------------------------------

#[component]
fn Home() -> impl IntoView {
    let toaster = use_toaster();
    let query = use_query_map();
    let code = RwSignal::new(query.with_untracked(|q| q.get("code")).unwrap_or_default());
    let name = RwSignal::new(String::new());
    let error = RwSignal::new(String::new());
    let joining = RwSignal::new(false);

    // A device that already joined goes straight back to its card.
    let navigate = use_navigate();
    Effect::new(move || {
        if device_identity().restore_player().is_some() {
            navigate("/play", NavigateOptions::default());
        }
    });

    let submit = move |ev: SubmitEvent| {
        ev.prevent_default();
        let c = code.get().trim().to_uppercase();
        let n = name.get().trim().to_string();
        if c.is_empty() || n.is_empty() {
            error.set("Please enter the game code and your name.".to_string());
            return;
        }
        joining.set(true);
        spawn_local(async move {
            let identity = device_identity();
            let device_id = identity.device_id();
            match join_session_handler(c, n, device_id).await {
                Ok((session, player)) => {
                    error.set(String::new());
                    identity.remember_player(&PlayerTicket {
                        player_id: player.id,
                        session_id: session.id,
                        session_code: session.code,
                        name: player.name.clone(),
                    });
                    toaster.success(format!("Welcome, {}!", player.name));
                    let navigate = use_navigate();
                    navigate("/play", NavigateOptions::default());
                }
                Err(e) => {
                    error.set(error_message(&e));
                }
            }
            joining.try_set(false);
        });
    };

    view! {
        <div class="home">
            <h1>"Anniversary Lucky Draw"</h1>
            <form on:submit=submit>
                <label>
                    "Game code: "
                    <input
                        type="text"
                        maxlength="6"
                        prop:value=move || code.get()
                        on:input=move |ev| code.set(event_target_value(&ev).to_uppercase())
                    />
                </label>
                <label>
                    "Your name: "
                    <input type="text" on:input=move |ev| name.set(event_target_value(&ev)) />
                </label>
                <button type="submit" disabled=move || joining.get()>
                    "Join Game"
                </button>
            </form>
            {move || (!error.get().is_empty()).then(|| view! { <p class="error">{error.get()}</p> })}
            <nav>
                <a href="/host">"Host a game"</a>
                " · "
                <a href="/blessings">"Leave a blessing"</a>
                " · "
                <a href="/cloud">"Blessing cloud"</a>
                " · "
                <a href="/scoreboard">"Scoreboard"</a>
            </nav>
        </div>
    }
}

// ---------------------------------------------------------------------------------------------
// Host
// ---------------------------------------------------------------------------------------------

#[component]
fn HostPage() -> impl IntoView {
    let toaster = use_toaster();
    let host = RwSignal::new(None::<HostTicket>);
    let custom_code = RwSignal::new(String::new());
    let busy = RwSignal::new(false);

    Effect::new(move || {
        host.set(device_identity().restore_host());
    });

    let session_id = Signal::derive(move || host.get().map(|h| h.session_id));
    let state = use_session_view(session_id, toaster);

    // A remembered session that no longer loads, or has ended, is forgotten.
    Effect::new(move || {
        let gone = state.with(|view| {
            view.is_loaded() && view.session().is_none_or(|s| s.status == SessionStatus::Ended)
        });
        if gone && host.get_untracked().is_some() {
            device_identity().forget_host();
        }
    });

    let code = Signal::derive(move || host.get().map(|h| h.code));
    let qr = Resource::new(
        move || code.get(),
        |code| async move {
            match code {
                Some(code) => get_join_qr_handler(code).await.map(Some),
                None => Ok(None),
            }
        },
    );

    let create = move |ev: SubmitEvent| {
        ev.prevent_default();
        let typed = custom_code.get().trim().to_uppercase();
        let requested = (!typed.is_empty()).then_some(typed);
        busy.set(true);
        spawn_local(async move {
            match create_session_handler(requested).await {
                Ok(session) => {
                    let ticket = HostTicket {
                        session_id: session.id,
                        code: session.code.clone(),
                    };
                    device_identity().remember_host(&ticket);
                    host.set(Some(ticket));
                    custom_code.set(String::new());
                    toaster.success(format!("Game {} created", session.code));
                }
                Err(e) => toaster.error(error_message(&e)),
            }
            busy.set(false);
        });
    };

    let start = move |_| {
        let Some(ticket) = host.get_untracked() else {
            return;
        };
        busy.set(true);
        spawn_local(async move {
            match start_game_handler(ticket.session_id, Some(ticket.code)).await {
                Ok(outcome) => {
                    toaster.success(format!("{} winner(s) drawn. Let the scratching begin!", outcome.winners.len()));
                }
                Err(e) => {
                    toaster.error(format!("Could not start the game: {}", error_message(&e)));
                }
            }
            busy.set(false);
        });
    };

    let end = move |_| {
        let Some(ticket) = host.get_untracked() else {
            return;
        };
        spawn_local(async move {
            match end_game_handler(ticket.session_id, Some(ticket.code)).await {
                Ok(_) => toaster.info("Game ended"),
                Err(e) => toaster.error(error_message(&e)),
            }
        });
    };

    let new_game = move |_| {
        device_identity().forget_host();
        host.set(None);
    };

    let status = move || state.with(|view| view.status());
    let roster = move || state.with(|view| view.roster().to_vec());

    view! {
        <div class="host">
            <h1>"Host a Lucky Draw"</h1>
            <Show
                when=move || host.get().is_some()
                fallback=move || {
                    view! {
                        <form on:submit=create>
                            <label>
                                "Game code (leave empty to generate): "
                                <input
                                    type="text"
                                    maxlength="6"
                                    prop:value=move || custom_code.get()
                                    on:input=move |ev| custom_code.set(event_target_value(&ev).to_uppercase())
                                />
                            </label>
                            <button type="submit" disabled=move || busy.get()>
                                "Create Game"
                            </button>
                        </form>
                    }
                }
            >
                <h2>"Game code: " {move || code.get().unwrap_or_default()}</h2>
                <Suspense fallback=|| view! { "Loading QR code..." }>
                    {move || {
                        qr.with(|res| match res {
                            Some(Ok(Some(svg))) => {
                                view! { <div class="qr" inner_html=svg.clone()></div> }.into_any()
                            }
                            Some(Err(e)) => view! { <p class="error">{error_message(e)}</p> }.into_any(),
                            _ => view! {}.into_any(),
                        })
                    }}
                </Suspense>
                <p>
                    "Status: "
                    {move || {
                        match status() {
                            Some(s) => s.to_string(),
                            None if state.with(|view| view.is_loading()) => "loading...".to_string(),
                            None => "unavailable".to_string(),
                        }
                    }}
                </p>
                <h3>"Players (" {move || state.with(|view| view.roster().len())} ")"</h3>
                <ol>
                    <For
                        each=roster
                        key=|player| (player.id, player.is_winner)
                        children=move |player: Player| {
                            let label = if player.is_winner {
                                format!("{} 🏆 {}", player.name, player.winner_tier.title())
                            } else {
                                player.name.clone()
                            };
                            view! { <li>{label}</li> }
                        }
                    />
                </ol>
                <div class="actions">
                    <Show when=move || status() == Some(SessionStatus::Waiting)>
                        <button
                            on:click=start
                            disabled=move || busy.get() || state.with(|view| view.roster().is_empty())
                        >
                            "Start Game"
                        </button>
                    </Show>
                    <Show when=move || status().is_some_and(|s| s.is_live())>
                        <button on:click=end>"End Game"</button>
                    </Show>
                    <button on:click=new_game>"New Game"</button>
                </div>
            </Show>
        </div>
    }
}

// ---------------------------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------------------------

#[component]
fn PlayerPage() -> impl IntoView {
    let toaster = use_toaster();
    let ticket = RwSignal::new(None::<PlayerTicket>);
    let result = RwSignal::new(None::<PlayerResult>);
    let fetching = RwSignal::new(false);
    let revealed = RwSignal::new(false);

    let navigate = use_navigate();
    Effect::new(move || match device_identity().restore_player() {
        Some(saved) => ticket.set(Some(saved)),
        None => navigate("/", NavigateOptions::default()),
    });

    let session_id = Signal::derive(move || ticket.get().map(|t| t.session_id));
    let state = use_session_view(session_id, toaster);

    // Once the host starts the game, read our own row.
    Effect::new(move || {
        let started = state.with(|view| {
            view.status()
                .is_some_and(|s| s != SessionStatus::Waiting)
        });
        if !started || fetching.get_untracked() {
            return;
        }
        if !matches!(result.get_untracked(), None | Some(PlayerResult::Pending)) {
            return;
        }
        let Some(t) = ticket.get_untracked() else {
            return;
        };
        fetching.set(true);
        spawn_local(async move {
            match get_player_result_handler(t.player_id, device_identity().device_id()).await {
                Ok(res) => {
                    result.try_set(Some(res));
                }
                Err(e) => toaster.error(error_message(&e)),
            }
            fetching.try_set(false);
        });
    });

    // The ticket points at a session that is gone.
    let navigate = use_navigate();
    Effect::new(move || {
        let missing = state.with(|view| view.is_loaded() && view.session().is_none());
        if missing && ticket.get_untracked().is_some() {
            device_identity().forget_player();
            toaster.info("That game is no longer available.");
            navigate("/", NavigateOptions::default());
        }
    });

    let leave = move |_| {
        let Some(t) = ticket.get_untracked() else {
            return;
        };
        spawn_local(async move {
            let identity = device_identity();
            match leave_session_handler(t.player_id, identity.device_id()).await {
                Ok(()) => {
                    identity.forget_player();
                    let navigate = use_navigate();
                    navigate("/", NavigateOptions::default());
                }
                Err(e) => toaster.error(error_message(&e)),
            }
        });
    };

    let on_revealed = Callback::new(move |_: ()| {
        revealed.set(true);
        if let Some(PlayerResult::Revealed { is_winner: true, tier }) = result.get_untracked() {
            toaster.success(format!("Congratulations! {}", tier.title()));
        }
    });

    // The card is only rebuilt when the stage changes, never on unrelated roster updates.
    let stage = Memo::new(move |_| {
        if let Some(PlayerResult::Revealed { is_winner, tier }) = result.get() {
            return PlayerStage::Card { is_winner, tier };
        }
        state.with(|view| {
            if view.is_loading() && view.session().is_none() {
                return PlayerStage::Loading;
            }
            match view.status() {
                Some(SessionStatus::Waiting) => PlayerStage::Waiting,
                Some(SessionStatus::Playing) => PlayerStage::Preparing,
                Some(SessionStatus::Ended) => PlayerStage::Ended,
                None => PlayerStage::Unavailable,
            }
        })
    });

    let body = move || match stage.get() {
        PlayerStage::Loading => view! { <p>"Loading your game..."</p> }.into_any(),
        PlayerStage::Waiting => view! {
            <p>"Waiting for the host to start the game..."</p>
            <p>{move || state.with(|view| view.roster().len())} " players have joined."</p>
        }
        .into_any(),
        PlayerStage::Card { is_winner, tier } => {
            let (headline, detail) = if is_winner {
                ("🎉 You won! 🎉".to_string(), tier.title().to_string())
            } else {
                (
                    "Not this time".to_string(),
                    "Thank you for celebrating with us!".to_string(),
                )
            };
            view! {
                <ScratchCardView theme=CoverTheme::Gold on_complete=on_revealed>
                    <div class="prize">
                        <h2>{headline}</h2>
                        <p>{detail}</p>
                    </div>
                </ScratchCardView>
                <Show when=move || revealed.get()>
                    <p>"Show this screen to the hosts."</p>
                </Show>
            }
            .into_any()
        }
        PlayerStage::Preparing => view! { <p>"Getting your card ready..."</p> }.into_any(),
        PlayerStage::Ended => view! { <p>"This game has ended."</p> }.into_any(),
        PlayerStage::Unavailable => view! { <p>"This game is unavailable."</p> }.into_any(),
    };

    view! {
        <div class="player">
            <h1>"Hi, " {move || ticket.get().map(|t| t.name).unwrap_or_default()}</h1>
            <p>"Game " {move || ticket.get().map(|t| t.session_code).unwrap_or_default()}</p>
            {body}
            <button on:click=leave>"Leave Game"</button>
        </div>
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PlayerStage {
    Loading,
    Waiting,
    Preparing,
    Card { is_winner: bool, tier: WinnerTier },
    Ended,
    Unavailable,
}

#[derive(Debug, Clone, Copy)]
enum PointerAction {
    Down,
    Move,
    Up,
    Leave,
}

/// A canvas cover over `children` that the player scratches away. `on_complete` runs once, when
/// more than `threshold` percent of the cover is gone.
#[component]
fn ScratchCardView(
    #[prop(optional)] theme: CoverTheme,
    #[prop(default = DEFAULT_THRESHOLD_PERCENT)] threshold: f64,
    #[prop(into)] on_complete: Callback<()>,
    children: Children,
) -> impl IntoView {
    let canvas_ref = NodeRef::<leptos::html::Canvas>::new();
    let revealed = RwSignal::new(false);
    let card = StoredValue::new_local(None::<ScratchCard>);
    let config = ScratchConfig {
        threshold_percent: threshold,
        theme,
        ..ScratchConfig::default()
    };

    #[cfg(feature = "hydrate")]
    Effect::new(move || {
        if let Some(canvas) = canvas_ref.get() {
            canvas::init(canvas, card, revealed, config, on_complete);
        }
    });
    #[cfg(not(feature = "hydrate"))]
    let _ = (config, on_complete);

    let handle = move |ev: leptos::ev::PointerEvent, action: PointerAction| {
        ev.prevent_default();
        let (x, y) = (ev.offset_x() as f64, ev.offset_y() as f64);
        let effect = card
            .try_update_value(|card| match card.as_mut() {
                Some(card) => match action {
                    PointerAction::Down => card.pointer_down(x, y),
                    PointerAction::Move => card.pointer_move(x, y),
                    PointerAction::Up => {
                        card.pointer_up();
                        ScratchEffect::Ignored
                    }
                    PointerAction::Leave => {
                        card.pointer_leave();
                        ScratchEffect::Ignored
                    }
                },
                None => ScratchEffect::Ignored,
            })
            .unwrap_or(ScratchEffect::Ignored);

        #[cfg(feature = "hydrate")]
        if let Some(canvas) = canvas_ref.get_untracked() {
            canvas::mirror(&canvas, effect);
        }
        #[cfg(not(feature = "hydrate"))]
        let _ = effect;
    };

    view! {
        <div class="scratch-card">
            <div class="reward">{children()}</div>
            <canvas
                node_ref=canvas_ref
                class:revealed=move || revealed.get()
                on:pointerdown=move |ev| handle(ev, PointerAction::Down)
                on:pointermove=move |ev| handle(ev, PointerAction::Move)
                on:pointerup=move |ev| handle(ev, PointerAction::Up)
                on:pointerleave=move |ev| handle(ev, PointerAction::Leave)
            ></canvas>
        </div>
    }
}

// Mirrors the scratch card state onto a 2D canvas.
#[cfg(feature = "hydrate")]
mod canvas {
    use leptos::prelude::*;
    use wasm_bindgen::JsCast;
    use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement};

    use crate::scratch::{CoverTheme, ScratchCard, ScratchConfig, ScratchEffect};

    fn context(canvas: &HtmlCanvasElement) -> Option<CanvasRenderingContext2d> {
        canvas.get_context("2d").ok().flatten()?.dyn_into().ok()
    }

    pub fn init(
        canvas: HtmlCanvasElement,
        card: StoredValue<Option<ScratchCard>, LocalStorage>,
        revealed: RwSignal<bool>,
        config: ScratchConfig,
        on_complete: Callback<()>,
    ) {
        // Gone, or already set up.
        if card.try_with_value(|c| c.is_some()).unwrap_or(true) {
            return;
        }
        let rect = canvas.get_bounding_client_rect();
        let (width, height) = (rect.width(), rect.height());
        let Some(new_card) = ScratchCard::new(width, height, config, move || {
            revealed.try_set(true);
            on_complete.run(());
        }) else {
            // No layout yet.
            request_animation_frame(move || init(canvas, card, revealed, config, on_complete));
            return;
        };

        let ratio = new_card.config().pixel_ratio;
        canvas.set_width((width * ratio).round() as u32);
        canvas.set_height((height * ratio).round() as u32);
        if let Some(ctx) = context(&canvas) {
            let _ = ctx.scale(ratio, ratio);
            paint_cover(&ctx, width, height, config.theme);
        }
        card.try_set_value(Some(new_card));
    }

    fn paint_cover(ctx: &CanvasRenderingContext2d, width: f64, height: f64, theme: CoverTheme) {
        let gradient = ctx.create_linear_gradient(0.0, 0.0, width, height);
        for (i, stop) in theme.gradient_stops().iter().enumerate() {
            let _ = gradient.add_color_stop(i as f32 / 2.0, stop);
        }
        ctx.set_fill_style_canvas_gradient(&gradient);
        ctx.fill_rect(0.0, 0.0, width, height);

        ctx.set_fill_style_str("rgba(255, 255, 255, 0.9)");
        ctx.set_font("bold 22px serif");
        ctx.set_text_align("center");
        ctx.set_text_baseline("middle");
        let _ = ctx.fill_text("✨ Scratch here ✨", width / 2.0, height / 2.0);
    }

    pub fn mirror(canvas: &HtmlCanvasElement, effect: ScratchEffect) {
        let Some(ctx) = context(canvas) else {
            return;
        };
        match effect {
            ScratchEffect::Ignored => {}
            ScratchEffect::Erased { from, to, radius } => {
                let _ = ctx.set_global_composite_operation("destination-out");
                ctx.set_line_width(radius * 2.0);
                ctx.set_line_cap("round");
                ctx.begin_path();
                ctx.move_to(from.0, from.1);
                ctx.line_to(to.0, to.1);
                ctx.stroke();
                // A zero-length line draws nothing.
                ctx.begin_path();
                let _ = ctx.arc(to.0, to.1, radius, 0.0, std::f64::consts::TAU);
                ctx.fill();
            }
            ScratchEffect::Revealed => {
                ctx.clear_rect(0.0, 0.0, canvas.width() as f64, canvas.height() as f64);
            }
        }
    }
}

// ---------------------------------------------------------------------------------------------
// Blessings
// ---------------------------------------------------------------------------------------------

#[component]
fn BlessingsPage() -> impl IntoView {
    let toaster = use_toaster();
    let message = RwSignal::new(String::new());
    let submitting = RwSignal::new(false);
    let blessings = use_live_blessings(toaster);

    let submit = move |ev: SubmitEvent| {
        ev.prevent_default();
        // Checked here first so obviously bad input never leaves the device.
        let text = match validate_blessing(&message.get()) {
            Ok(text) => text,
            Err(e) => {
                toaster.error(e.to_string());
                return;
            }
        };
        submitting.set(true);
        spawn_local(async move {
            match submit_blessing_handler(text).await {
                Ok(_) => {
                    message.set(String::new());
                    toaster.success("Thank you for your blessing! 🌸");
                }
                Err(e) => toaster.error(error_message(&e)),
            }
            submitting.set(false);
        });
    };

    let too_short =
        move || message.with(|m| m.trim().chars().count() < MIN_BLESSING_CHARS);

    view! {
        <div class="blessings">
            <h1>"Send Your Blessings"</h1>
            <form on:submit=submit>
                <textarea
                    maxlength=MAX_BLESSING_CHARS.to_string()
                    placeholder="Write your wishes for the happy couple..."
                    prop:value=move || message.get()
                    on:input=move |ev| message.set(event_target_value(&ev))
                ></textarea>
                <p class="counter">
                    {move || message.with(|m| m.chars().count())} "/" {MAX_BLESSING_CHARS}
                    " characters"
                </p>
                <button type="submit" disabled=move || submitting.get() || too_short()>
                    {move || if submitting.get() { "Sending..." } else { "Send Blessing" }}
                </button>
            </form>
            <ul class="blessing-list">
                <For
                    each=move || blessings.get()
                    key=|b| b.id
                    children=move |b: Blessing| view! { <li>{b.message}</li> }
                />
            </ul>
        </div>
    }
}

#[component]
fn WordCloudPage() -> impl IntoView {
    let toaster = use_toaster();
    let blessings = use_live_blessings(toaster);

    let words = Memo::new(move |_| {
        blessings.with(|list| {
            let counts = word_frequencies(list.iter().map(|b| b.message.as_str()));
            sphere_layout(&ranked(&counts))
        })
    });

    view! {
        <div class="cloud">
            <h1>"Blessing Cloud"</h1>
            <Show
                when=move || words.with(|w| !w.is_empty())
                fallback=|| view! { <p>"No blessings yet. Be the first!"</p> }
            >
                <div class="cloud-sphere">
                    {move || {
                        words
                            .get()
                            .into_iter()
                            .map(|placed| {
                                let [x, y, z] = placed.position;
                                // Project the sphere onto the page; nearer words are brighter.
                                let style = format!(
                                    "left: {:.1}%; top: {:.1}%; font-size: {:.2}rem; opacity: {:.2};",
                                    50.0 + x * 9.0,
                                    50.0 + y * 9.0,
                                    0.6 + placed.size * 1.6,
                                    0.55 + (z + 5.0) / 22.0,
                                );
                                view! {
                                    <span class="cloud-word" style=style title=placed.count.to_string()>
                                        {placed.word}
                                    </span>
                                }
                            })
                            .collect_view()
                    }}
                </div>
            </Show>
        </div>
    }
}

// ---------------------------------------------------------------------------------------------
// Scoreboard
// ---------------------------------------------------------------------------------------------

#[component]
fn ScoreboardPage() -> impl IntoView {
    let toaster = use_toaster();
    let board = RwSignal::new(None::<Scoreboard>);
    let celebrate = RwSignal::new(false);

    let reload = move || {
        spawn_local(async move {
            match get_scoreboard_handler().await {
                Ok(current) => {
                    board.try_set(Some(current));
                }
                Err(e) => toaster.error(error_message(&e)),
            }
        });
    };
    Effect::new(move || reload());

    use_change_feed(
        || vec![ChangeFilter::table(Table::Scoreboards)],
        move |message| match message {
            FeedMessage::Event {
                event: ChangeEvent::ScoreboardUpdated(current),
            } => {
                if let Some(previous) = board.get_untracked() {
                    let change = ScoreChange::between(&previous, &current);
                    if !change.is_quiet() {
                        if let Some(team) = change.new_leader {
                            toaster.info(format!("{} takes the lead!", team.name(&current)));
                        }
                        celebrate.set(change.celebrate);
                    }
                }
                board.try_set(Some(current));
            }
            FeedMessage::Event { .. } => {}
            FeedMessage::Resync { .. } => reload(),
        },
    );

    let team_card = move |team: Team| {
        move || {
            board.get().map(|b| {
                let leading = leader(&b) == Some(team);
                view! {
                    <div class="team" class:leading=leading>
                        <h2>{team.name(&b).to_string()}</h2>
                        <p class="score">{team.score(&b)}</p>
                    </div>
                }
            })
        }
    };

    view! {
        <div class="scoreboard" class:celebrate=move || celebrate.get()>
            <h1>"Scoreboard"</h1>
            <div class="teams">{team_card(Team::One)} {team_card(Team::Two)}</div>
            {move || {
                board
                    .get()
                    .filter(|b| leader(b).is_none())
                    .map(|_| view! { <p>"It's a tie!"</p> })
            }}
        </div>
    }
}

// ---------------------------------------------------------------------------------------------
// Admin
// ---------------------------------------------------------------------------------------------

#[component]
fn AdminLogin() -> impl IntoView {
    let password = RwSignal::new(String::new());
    let error = RwSignal::new(String::new());

    let submit = move |ev: SubmitEvent| {
        ev.prevent_default();
        let p = password.get();
        if p.is_empty() {
            error.set("Please enter password.".to_string());
            return;
        }
        spawn_local(async move {
            match admin_login(p).await {
                Ok(_) => {
                    error.set(String::new());
                    let navigate = use_navigate();
                    navigate("/admin", NavigateOptions::default());
                }
                Err(e) => error.set(error_message(&e)),
            }
        });
    };

    view! {
        <div>
            <h1>"Admin Login"</h1>
            <form on:submit=submit>
                <label>
                    "Password: "
                    <input
                        type="password"
                        on:input=move |ev| password.set(event_target_value(&ev))
                    />
                </label>
                <button type="submit">"Login"</button>
            </form>
            {move || {
                if !error.get().is_empty() {
                    view! { <p class="error">{error.get()}</p> }.into_any()
                } else {
                    view! {}.into_any()
                }
            }}
        </div>
    }
}

#[component]
fn AdminDashboard() -> impl IntoView {
    let toaster = use_toaster();
    let is_admin_fetcher = Resource::new(|| (), |_| is_admin());
    let sessions_fetcher = Resource::new(|| (), |_| get_live_sessions_handler());
    let blessings_fetcher = Resource::new(|| (), |_| get_blessings_handler());
    let scoreboard_fetcher = Resource::new(|| (), |_| get_scoreboard_handler());

    // Runs on the next "tick" and redirects to the home page if the user is not an admin.
    let navigate = use_navigate();
    Effect::new(move || {
        is_admin_fetcher.with(|maybe_result| {
            if let Some(Ok(false)) = maybe_result {
                navigate("/admin/login", NavigateOptions::default());
            }
        });
    });

    let adjust = move |team: Team, delta: i32| {
        spawn_local(async move {
            match adjust_score_handler(team, delta).await {
                Ok(_) => scoreboard_fetcher.refetch(),
                Err(e) => toaster.error(error_message(&e)),
            }
        });
    };

    let team1_name = RwSignal::new(String::new());
    let team2_name = RwSignal::new(String::new());
    let rename_submit = move |ev: SubmitEvent| {
        ev.prevent_default();
        let (t1, t2) = (team1_name.get(), team2_name.get());
        spawn_local(async move {
            match rename_teams_handler(t1, t2).await {
                Ok(_) => {
                    team1_name.set(String::new());
                    team2_name.set(String::new());
                    scoreboard_fetcher.refetch();
                    toaster.success("Teams renamed");
                }
                Err(e) => toaster.error(error_message(&e)),
            }
        });
    };

    let delete_blessing = move |blessing_id: i32| {
        spawn_local(async move {
            if leptos::leptos_dom::helpers::window()
                .confirm_with_message("Delete this blessing?")
                .unwrap_or(false)
            {
                match delete_blessing_handler(blessing_id).await {
                    Ok(_) => {
                        blessings_fetcher.refetch();
                        toaster.success("Blessing deleted");
                    }
                    Err(e) => toaster.error(error_message(&e)),
                }
            }
        });
    };

    let start_session = move |session_id: i32| {
        spawn_local(async move {
            match start_game_handler(session_id, None).await {
                Ok(outcome) => {
                    sessions_fetcher.refetch();
                    let names: Vec<String> = outcome
                        .winners
                        .iter()
                        .map(|w| format!("{} ({})", w.name, w.tier.title()))
                        .collect();
                    toaster.success(format!("Winners: {}", names.join(", ")));
                }
                Err(e) => toaster.error(error_message(&e)),
            }
        });
    };

    let end_session = move |session_id: i32| {
        spawn_local(async move {
            match end_game_handler(session_id, None).await {
                Ok(_) => sessions_fetcher.refetch(),
                Err(e) => toaster.error(error_message(&e)),
            }
        });
    };

    let logout = move |_| {
        spawn_local(async move {
            match admin_logout().await {
                Ok(_) => {
                    let navigate = use_navigate();
                    navigate("/", NavigateOptions::default());
                }
                Err(e) => toaster.error(error_message(&e)),
            }
        });
    };

    view! {
        <div class="admin">
            <h1>"Admin Dashboard"</h1>
            <button on:click=logout>"Logout"</button>

            <h2>"Scoreboard"</h2>
            <Suspense fallback=|| view! { "Loading..." }>
                {move || {
                    scoreboard_fetcher
                        .with(|res| match res {
                            Some(Ok(board)) => {
                                let rows = [Team::One, Team::Two]
                                    .into_iter()
                                    .map(|team| {
                                        view! {
                                            <tr>
                                                <td>{team.name(board).to_string()}</td>
                                                <td>{team.score(board)}</td>
                                                <td>
                                                    <button on:click=move |_| adjust(team, 1)>"+1"</button>
                                                    <button on:click=move |_| adjust(team, -1)>"-1"</button>
                                                </td>
                                            </tr>
                                        }
                                    })
                                    .collect_view();
                                view! { <table>{rows}</table> }.into_any()
                            }
                            Some(Err(e)) => view! { <p class="error">{error_message(e)}</p> }.into_any(),
                            None => view! {}.into_any(),
                        })
                }}
            </Suspense>
            <form on:submit=rename_submit>
                <input
                    type="text"
                    placeholder="Team 1 name"
                    prop:value=move || team1_name.get()
                    on:input=move |ev| team1_name.set(event_target_value(&ev))
                />
                <input
                    type="text"
                    placeholder="Team 2 name"
                    prop:value=move || team2_name.get()
                    on:input=move |ev| team2_name.set(event_target_value(&ev))
                />
                <button type="submit">"Rename Teams"</button>
            </form>

            <h2>"Live Games"</h2>
            <button on:click=move |_| sessions_fetcher.refetch()>"Refresh"</button>
            <Suspense fallback=|| view! { "Loading..." }>
                {move || {
                    sessions_fetcher
                        .with(|res| match res {
                            Some(Ok(sessions)) if sessions.is_empty() => {
                                view! { <p>"No live games."</p> }.into_any()
                            }
                            Some(Ok(sessions)) => {
                                sessions
                                    .iter()
                                    .map(|session| {
                                        let id = session.id;
                                        let waiting = session.status == SessionStatus::Waiting;
                                        view! {
                                            <div class="session-row">
                                                <span>{session.code.clone()} " · " {session.status.to_string()}</span>
                                                {waiting
                                                    .then(|| {
                                                        view! {
                                                            <button on:click=move |_| start_session(id)>"Start"</button>
                                                        }
                                                    })}
                                                <button on:click=move |_| end_session(id)>"End"</button>
                                            </div>
                                        }
                                    })
                                    .collect_view()
                                    .into_any()
                            }
                            Some(Err(e)) => view! { <p class="error">{error_message(e)}</p> }.into_any(),
                            None => view! {}.into_any(),
                        })
                }}
            </Suspense>

            <h2>"Blessings"</h2>
            <button on:click=move |_| blessings_fetcher.refetch()>"Refresh"</button>
            <Suspense fallback=|| view! { "Loading..." }>
                {move || {
                    blessings_fetcher
                        .with(|res| match res {
                            Some(Ok(blessings)) => {
                                let counts: HashMap<String, u32> = word_frequencies(
                                    blessings.iter().map(|b| b.message.as_str()),
                                );
                                let top: Vec<String> = ranked(&counts)
                                    .into_iter()
                                    .take(5)
                                    .map(|(word, count)| format!("{word} ({count})"))
                                    .collect();
                                view! {
                                    <p>{blessings.len()} " blessings. Top words: " {top.join(", ")}</p>
                                    <ul>
                                        {blessings
                                            .iter()
                                            .map(|b| {
                                                let id = b.id;
                                                view! {
                                                    <li>
                                                        {b.message.clone()} " "
                                                        <small>{b.created_at.format("%b %d %H:%M").to_string()}</small>
                                                        <button on:click=move |_| delete_blessing(id)>"Delete"</button>
                                                    </li>
                                                }
                                            })
                                            .collect_view()}
                                    </ul>
                                }
                                    .into_any()
                            }
                            Some(Err(e)) => view! { <p class="error">{error_message(e)}</p> }.into_any(),
                            None => view! {}.into_any(),
                        })
                }}
            </Suspense>
        </div>
    }
}
