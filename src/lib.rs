pub mod app;
pub mod blessing;
#[cfg(feature = "ssr")]
pub mod config;
pub mod device;
pub mod draw;
pub mod error;
pub mod feed;
pub mod model;
#[cfg(feature = "ssr")]
pub mod schema;
pub mod scoreboard;
pub mod scratch;
pub mod sync;
pub mod words;

#[cfg(feature = "ssr")]
use chrono::{NaiveDateTime, Utc};
#[cfg(feature = "ssr")]
use diesel::connection::SimpleConnection;
#[cfg(feature = "ssr")]
use diesel::prelude::*;
#[cfg(feature = "ssr")]
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool};
#[cfg(feature = "ssr")]
use diesel::SqliteConnection;
use rand::Rng;
#[cfg(feature = "ssr")]
use uuid::Uuid;

#[cfg(feature = "ssr")]
use crate::blessing::{screen_blessing, ModerationMode, Moderator};
#[cfg(feature = "ssr")]
use crate::draw::{DrawOutcome, DrawStore, HostAuthority, PrizePlan};
use crate::error::AppError;
#[cfg(feature = "ssr")]
use crate::error::is_unique_violation;
#[cfg(feature = "ssr")]
use crate::model::{
    Blessing, DbGameSession, DbPlayer, GameSession, NewAdminSession, NewBlessing, NewGameSession,
    NewPlayer, Player, PlayerResult, Scoreboard, SessionStatus, WinnerTier,
};
#[cfg(feature = "ssr")]
use crate::schema::{admin_sessions, blessings, game_sessions, players, scoreboards};
#[cfg(feature = "ssr")]
use crate::scoreboard::{adjusted_score, validate_team_name, Team};

#[cfg(feature = "hydrate")]
#[wasm_bindgen::prelude::wasm_bindgen]
pub fn hydrate() {
    use crate::app::*;
    console_error_panic_hook::set_once();
    leptos::mount::hydrate_body(App);
}

pub const SESSION_CODE_LEN: usize = 6;
const SESSION_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
pub const MAX_PLAYER_NAME_CHARS: usize = 40;

/// A random 6-char upper-case alphanumeric join code.
pub fn generate_session_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..SESSION_CODE_LEN)
        .map(|_| SESSION_CODE_ALPHABET[rng.random_range(0..SESSION_CODE_ALPHABET.len())] as char)
        .collect()
}

/// Upper-cases a typed code and checks it is 6 ASCII letters or digits.
pub fn normalize_session_code(input: &str) -> Result<String, AppError> {
    let code = input.trim().to_ascii_uppercase();
    if code.len() != SESSION_CODE_LEN || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(AppError::Validation(format!(
            "Game code must be {SESSION_CODE_LEN} letters or digits"
        )));
    }
    Ok(code)
}

pub fn validate_player_name(name: &str) -> Result<String, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Please enter your name".to_string()));
    }
    if name.chars().count() > MAX_PLAYER_NAME_CHARS {
        return Err(AppError::Validation(format!(
            "Name must be at most {MAX_PLAYER_NAME_CHARS} characters"
        )));
    }
    Ok(name.to_string())
}

/// Link players scan to land on the join form with the code filled in.
pub fn join_url(base_url: &str, code: &str) -> String {
    format!("{}/?code={}", base_url.trim_end_matches('/'), code)
}

/// Renders the join link for a session as an SVG QR code.
pub fn join_qr_svg(join_url: &str) -> Result<String, AppError> {
    use qrcode::render::svg;
    use qrcode::QrCode;

    let code = QrCode::new(join_url.as_bytes())
        .map_err(|e| AppError::Validation(format!("Could not encode join link: {e}")))?;
    Ok(code
        .render::<svg::Color>()
        .min_dimensions(220, 220)
        .dark_color(svg::Color("#5b3a29"))
        .light_color(svg::Color("#fffaf0"))
        .build())
}

#[cfg(feature = "ssr")]
pub const SCHEMA_SQL: &str =
    include_str!("../migrations/2025-10-01-000000_create_lucky_draw/up.sql");

#[cfg(feature = "ssr")]
const SQLITE_PRAGMAS: &str = "PRAGMA foreign_keys = ON; \
    PRAGMA journal_mode = WAL; \
    PRAGMA synchronous = NORMAL; \
    PRAGMA busy_timeout = 10000;";

#[cfg(feature = "ssr")]
pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;

#[cfg(feature = "ssr")]
pub fn establish_connection(database_url: &str) -> Result<SqliteConnection, AppError> {
    let mut conn = SqliteConnection::establish(database_url)?;

    // Enable WAL mode to allow concurrent reads during writes, and a timeout to retry locked
    // operations. Foreign keys are needed for the players cascade.
    conn.batch_execute(SQLITE_PRAGMAS)?;

    Ok(conn)
}

/// Applies the same PRAGMAs as [`establish_connection`] to every pooled connection.
#[cfg(feature = "ssr")]
#[derive(Debug, Clone, Copy)]
pub struct SqlitePragmas;

#[cfg(feature = "ssr")]
impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for SqlitePragmas {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        conn.batch_execute(SQLITE_PRAGMAS)
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

#[cfg(feature = "ssr")]
pub fn build_pool(database_url: &str) -> Result<DbPool, AppError> {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    Ok(Pool::builder()
        .connection_customizer(Box::new(SqlitePragmas))
        .build(manager)?)
}

/// Creates any missing tables and seeds the scoreboard. Safe to run on every start.
#[cfg(feature = "ssr")]
pub fn ensure_schema(conn: &mut SqliteConnection) -> Result<(), AppError> {
    conn.batch_execute(SCHEMA_SQL)?;
    Ok(())
}

#[cfg(feature = "ssr")]
fn not_found(what: &str) -> impl Fn(AppError) -> AppError + '_ {
    move |e| match e {
        AppError::NotFound(_) => AppError::NotFound(what.to_string()),
        other => other,
    }
}

/// Returns the session with the given id.
#[cfg(feature = "ssr")]
pub fn get_session(conn: &mut SqliteConnection, session_id: i32) -> Result<GameSession, AppError> {
    let row: DbGameSession = game_sessions::table
        .filter(game_sessions::id.eq(session_id))
        .select(DbGameSession::as_select())
        .first(conn)
        .map_err(AppError::from)
        .map_err(not_found("Session"))?;
    row.try_into()
}

/// Returns the waiting or playing session using `code`, if any.
#[cfg(feature = "ssr")]
pub fn find_live_session(
    conn: &mut SqliteConnection,
    code: &str,
) -> Result<Option<GameSession>, AppError> {
    let row: Option<DbGameSession> = game_sessions::table
        .filter(game_sessions::code.eq(code))
        .filter(
            game_sessions::status
                .eq_any([SessionStatus::Waiting.as_str(), SessionStatus::Playing.as_str()]),
        )
        .select(DbGameSession::as_select())
        .first(conn)
        .optional()?;
    row.map(GameSession::try_from).transpose()
}

/// Returns every waiting or playing session, newest first.
#[cfg(feature = "ssr")]
pub fn get_live_sessions(conn: &mut SqliteConnection) -> Result<Vec<GameSession>, AppError> {
    game_sessions::table
        .filter(
            game_sessions::status
                .eq_any([SessionStatus::Waiting.as_str(), SessionStatus::Playing.as_str()]),
        )
        .order((game_sessions::created_at.desc(), game_sessions::id.desc()))
        .select(DbGameSession::as_select())
        .load(conn)?
        .into_iter()
        .map(GameSession::try_from)
        .collect()
}

/// Creates a waiting session. Uses `code` if given, otherwise generates one. A code already held
/// by a live session is rejected, never silently regenerated.
#[cfg(feature = "ssr")]
pub fn create_session<R: Rng + ?Sized>(
    conn: &mut SqliteConnection,
    code: Option<&str>,
    rng: &mut R,
) -> Result<GameSession, AppError> {
    let code = match code {
        Some(code) => normalize_session_code(code)?,
        None => generate_session_code(rng),
    };

    conn.transaction(|conn| {
        if find_live_session(conn, &code)?.is_some() {
            return Err(AppError::DuplicateCode(code.clone()));
        }

        let new_session = NewGameSession {
            code: &code,
            status: SessionStatus::Waiting.as_str(),
        };
        let row: DbGameSession = diesel::insert_into(game_sessions::table)
            .values(&new_session)
            .returning(DbGameSession::as_returning())
            .get_result(conn)
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::DuplicateCode(code.clone())
                } else {
                    e.into()
                }
            })?;
        row.try_into()
    })
}

/// Adds a player to the waiting session with `code`. A device can join a session only once.
#[cfg(feature = "ssr")]
pub fn join_session(
    conn: &mut SqliteConnection,
    code: &str,
    name: &str,
    device_id: &str,
) -> Result<(GameSession, Player), AppError> {
    let code = normalize_session_code(code)?;
    let name = validate_player_name(name)?;
    let device_id = device_id.trim();
    if device_id.is_empty() {
        return Err(AppError::Validation("Missing device id".to_string()));
    }

    conn.transaction(|conn| {
        let session = find_live_session(conn, &code)?
            .ok_or_else(|| AppError::NotFound("Game".to_string()))?;
        if session.status != SessionStatus::Waiting {
            return Err(AppError::InvalidStatus {
                expected: SessionStatus::Waiting,
                actual: session.status,
            });
        }

        let new_player = NewPlayer {
            session_id: session.id,
            name: &name,
            device_id,
        };
        let row: DbPlayer = diesel::insert_into(players::table)
            .values(&new_player)
            .returning(DbPlayer::as_returning())
            .get_result(conn)
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::AlreadyJoined
                } else {
                    e.into()
                }
            })?;
        Ok((session, row.try_into()?))
    })
}

/// Removes the player's own row. The device id must match the one used to join.
#[cfg(feature = "ssr")]
pub fn leave_session(
    conn: &mut SqliteConnection,
    player_id: i32,
    device_id: &str,
) -> Result<Player, AppError> {
    conn.transaction(|conn| {
        let player = get_own_player(conn, player_id, device_id)?;
        diesel::delete(players::table.filter(players::id.eq(player.id))).execute(conn)?;
        Ok(player)
    })
}

#[cfg(feature = "ssr")]
fn get_own_player(
    conn: &mut SqliteConnection,
    player_id: i32,
    device_id: &str,
) -> Result<Player, AppError> {
    let row: DbPlayer = players::table
        .filter(players::id.eq(player_id))
        .filter(players::device_id.eq(device_id))
        .select(DbPlayer::as_select())
        .first(conn)
        .map_err(AppError::from)
        .map_err(not_found("Player"))?;
    row.try_into()
}

/// Returns the players of a session in join order.
#[cfg(feature = "ssr")]
pub fn get_roster(conn: &mut SqliteConnection, session_id: i32) -> Result<Vec<Player>, AppError> {
    players::table
        .filter(players::session_id.eq(session_id))
        .order((players::joined_at.asc(), players::id.asc()))
        .select(DbPlayer::as_select())
        .load(conn)?
        .into_iter()
        .map(Player::try_from)
        .collect()
}

/// Returns what a player may know about their own card. Winner fields stay hidden while the
/// session is waiting.
#[cfg(feature = "ssr")]
pub fn get_player_result(
    conn: &mut SqliteConnection,
    player_id: i32,
    device_id: &str,
) -> Result<PlayerResult, AppError> {
    let player = get_own_player(conn, player_id, device_id)?;
    let session = get_session(conn, player.session_id)?;
    if session.status == SessionStatus::Waiting {
        return Ok(PlayerResult::Pending);
    }
    Ok(PlayerResult::Revealed {
        is_winner: player.is_winner,
        tier: player.winner_tier,
    })
}

#[cfg(feature = "ssr")]
impl DrawStore for SqliteConnection {
    fn load_session(&mut self, session_id: i32) -> Result<GameSession, AppError> {
        get_session(self, session_id)
    }

    fn load_roster(&mut self, session_id: i32) -> Result<Vec<Player>, AppError> {
        get_roster(self, session_id)
    }

    fn write_winner(&mut self, player_id: i32, tier: WinnerTier) -> Result<(), AppError> {
        let updated = diesel::update(players::table.filter(players::id.eq(player_id)))
            .set((
                players::is_winner.eq(1i32),
                players::winner_tier.eq(tier.as_str()),
            ))
            .execute(self)?;
        if updated == 0 {
            return Err(AppError::NotFound("Player".to_string()));
        }
        Ok(())
    }

    fn clear_winner(&mut self, player_id: i32) -> Result<(), AppError> {
        diesel::update(players::table.filter(players::id.eq(player_id)))
            .set((
                players::is_winner.eq(0i32),
                players::winner_tier.eq(WinnerTier::None.as_str()),
            ))
            .execute(self)?;
        Ok(())
    }

    fn mark_playing(
        &mut self,
        session_id: i32,
        started_at: NaiveDateTime,
    ) -> Result<bool, AppError> {
        let updated = diesel::update(
            game_sessions::table
                .filter(game_sessions::id.eq(session_id))
                .filter(game_sessions::status.eq(SessionStatus::Waiting.as_str())),
        )
        .set((
            game_sessions::status.eq(SessionStatus::Playing.as_str()),
            game_sessions::started_at.eq(Some(started_at)),
        ))
        .execute(self)?;
        Ok(updated == 1)
    }
}

/// Runs the draw inside one SQLite transaction, so a failure leaves no winner written.
#[cfg(feature = "ssr")]
pub fn start_game_in_transaction<R: Rng + ?Sized>(
    conn: &mut SqliteConnection,
    session_id: i32,
    authority: &HostAuthority,
    plan: PrizePlan,
    rng: &mut R,
) -> Result<DrawOutcome, AppError> {
    conn.transaction(|conn| draw::start_game(conn, session_id, authority, plan, rng))
}

/// Moves a waiting or playing session to ended.
#[cfg(feature = "ssr")]
pub fn end_game(
    conn: &mut SqliteConnection,
    session_id: i32,
    authority: &HostAuthority,
) -> Result<GameSession, AppError> {
    conn.transaction(|conn| {
        let session = get_session(conn, session_id)?;
        if !authority.permits(&session) {
            return Err(AppError::Unauthorized);
        }
        if session.status == SessionStatus::Ended {
            return Err(AppError::InvalidStatus {
                expected: SessionStatus::Playing,
                actual: SessionStatus::Ended,
            });
        }
        diesel::update(game_sessions::table.filter(game_sessions::id.eq(session_id)))
            .set(game_sessions::status.eq(SessionStatus::Ended.as_str()))
            .execute(conn)?;
        get_session(conn, session_id)
    })
}

/// Validates, moderates when enforced, and stores a blessing.
#[cfg(feature = "ssr")]
pub fn submit_blessing<M: Moderator + ?Sized>(
    conn: &mut SqliteConnection,
    message: &str,
    mode: ModerationMode,
    moderator: &M,
) -> Result<Blessing, AppError> {
    let message = screen_blessing(message, mode, moderator)?;
    let blessing = diesel::insert_into(blessings::table)
        .values(&NewBlessing { message: &message })
        .returning(Blessing::as_returning())
        .get_result(conn)?;
    Ok(blessing)
}

/// Returns all blessings, newest first.
#[cfg(feature = "ssr")]
pub fn get_all_blessings(conn: &mut SqliteConnection) -> Result<Vec<Blessing>, AppError> {
    Ok(blessings::table
        .order((blessings::created_at.desc(), blessings::id.desc()))
        .select(Blessing::as_select())
        .load(conn)?)
}

#[cfg(feature = "ssr")]
pub fn delete_blessing(conn: &mut SqliteConnection, blessing_id: i32) -> Result<(), AppError> {
    let deleted =
        diesel::delete(blessings::table.filter(blessings::id.eq(blessing_id))).execute(conn)?;
    if deleted == 0 {
        return Err(AppError::NotFound("Blessing".to_string()));
    }
    Ok(())
}

/// Returns the most recently updated scoreboard.
#[cfg(feature = "ssr")]
pub fn get_current_scoreboard(conn: &mut SqliteConnection) -> Result<Scoreboard, AppError> {
    scoreboards::table
        .order((scoreboards::updated_at.desc(), scoreboards::id.desc()))
        .select(Scoreboard::as_select())
        .first(conn)
        .map_err(AppError::from)
        .map_err(not_found("Scoreboard"))
}

/// Adds `delta` to one team's score, stopping at zero.
#[cfg(feature = "ssr")]
pub fn adjust_team_score(
    conn: &mut SqliteConnection,
    team: Team,
    delta: i32,
) -> Result<Scoreboard, AppError> {
    conn.transaction(|conn| {
        let board = get_current_scoreboard(conn)?;
        let score = adjusted_score(team.score(&board), delta);
        let now = Utc::now().naive_utc();
        let target = scoreboards::table.filter(scoreboards::id.eq(board.id));
        match team {
            Team::One => diesel::update(target)
                .set((
                    scoreboards::team1_score.eq(score),
                    scoreboards::updated_at.eq(now),
                ))
                .execute(conn)?,
            Team::Two => diesel::update(target)
                .set((
                    scoreboards::team2_score.eq(score),
                    scoreboards::updated_at.eq(now),
                ))
                .execute(conn)?,
        };
        get_current_scoreboard(conn)
    })
}

#[cfg(feature = "ssr")]
pub fn rename_teams(
    conn: &mut SqliteConnection,
    team1_name: &str,
    team2_name: &str,
) -> Result<Scoreboard, AppError> {
    let team1_name = validate_team_name(team1_name)?;
    let team2_name = validate_team_name(team2_name)?;
    conn.transaction(|conn| {
        let board = get_current_scoreboard(conn)?;
        diesel::update(scoreboards::table.filter(scoreboards::id.eq(board.id)))
            .set((
                scoreboards::team1_name.eq(&team1_name),
                scoreboards::team2_name.eq(&team2_name),
                scoreboards::updated_at.eq(Utc::now().naive_utc()),
            ))
            .execute(conn)?;
        get_current_scoreboard(conn)
    })
}

/// Creates an admin session and returns the token.
#[cfg(feature = "ssr")]
pub fn create_admin_session(conn: &mut SqliteConnection) -> Result<String, AppError> {
    let token = Uuid::new_v4().to_string();
    diesel::insert_into(admin_sessions::table)
        .values(&NewAdminSession {
            token: token.clone(),
        })
        .execute(conn)?;
    Ok(token)
}

/// Validates an admin token. Returns true if the provided token exists in the admin_sessions
/// table and has not expired.
#[cfg(feature = "ssr")]
pub fn validate_admin_token(conn: &mut SqliteConnection, token: &str) -> Result<bool, AppError> {
    if Uuid::parse_str(token).is_err() {
        return Ok(false);
    }
    let now = Utc::now().naive_utc();
    let count: i64 = admin_sessions::table
        .filter(admin_sessions::token.eq(token))
        .filter(
            admin_sessions::expires_at
                .is_null()
                .or(admin_sessions::expires_at.gt(now)),
        )
        .count()
        .get_result(conn)?;
    Ok(count > 0)
}

#[cfg(feature = "ssr")]
pub fn delete_admin_session(conn: &mut SqliteConnection, token: &str) -> Result<(), AppError> {
    diesel::delete(admin_sessions::table.filter(admin_sessions::token.eq(token))).execute(conn)?;
    Ok(())
}

/// Deletes every session and player. Returns the number of sessions removed.
#[cfg(feature = "ssr")]
pub fn clear_sessions(conn: &mut SqliteConnection) -> Result<usize, AppError> {
    conn.transaction(|conn| {
        diesel::delete(players::table).execute(conn)?;
        Ok(diesel::delete(game_sessions::table).execute(conn)?)
    })
}

/// Resets the entire database to its initial state.
#[cfg(feature = "ssr")]
pub fn reset_database(conn: &mut SqliteConnection) -> Result<(), AppError> {
    conn.transaction(|conn| {
        clear_sessions(conn)?;
        diesel::delete(blessings::table).execute(conn)?;
        diesel::delete(admin_sessions::table).execute(conn)?;

        // Scores back to zero. Team names are kept.
        diesel::update(scoreboards::table)
            .set((
                scoreboards::team1_score.eq(0i32),
                scoreboards::team2_score.eq(0i32),
                scoreboards::updated_at.eq(Utc::now().naive_utc()),
            ))
            .execute(conn)?;

        Ok(())
    })
}
