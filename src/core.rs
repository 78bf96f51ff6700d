// СЛОВНИК
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_2;
use thiserror::Error;

/// Двовимірна позиція агента в координатах арени.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Незмінні параметри арени, які сервер надсилає у відповідь на приєднання.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArenaConfig {
    /// Довжина сторони квадратної арени.
    pub arena_size: f64,
    /// Радіус зіткнення агента.
    pub bot_radius: f64,
}

/// Стан живучості агента, який повертає запит `getInfoRequest`.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentState {
    /// 0 означає, що поточна гра ще не почалася.
    pub game_number: u64,
    pub health: f64,
    #[serde(default)]
    pub points: f64,
}

impl AgentState {
    pub fn is_alive(&self) -> bool {
        self.health > 0.0
    }
}

/// Край арени, вздовж якого зараз рухається агент.
///
/// Порядок варіантів збігається з порядком обходу: кожен наступний край
/// повернутий на π/2 відносно попереднього.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BorderFacing {
    #[default]
    Right,
    Bottom,
    Left,
    Top,
}

impl BorderFacing {
    pub const fn index(self) -> u8 {
        match self {
            BorderFacing::Right => 0,
            BorderFacing::Bottom => 1,
            BorderFacing::Left => 2,
            BorderFacing::Top => 3,
        }
    }

    /// Наступний край за циклом RIGHT → BOTTOM → LEFT → TOP → RIGHT.
    pub const fn next(self) -> Self {
        match self {
            BorderFacing::Right => BorderFacing::Bottom,
            BorderFacing::Bottom => BorderFacing::Left,
            BorderFacing::Left => BorderFacing::Top,
            BorderFacing::Top => BorderFacing::Right,
        }
    }

    /// Курс у радіанах, що веде агента до цього краю.
    pub fn heading(self) -> f64 {
        FRAC_PI_2 * f64::from(self.index())
    }

    /// Перпендикулярна відстань від позиції до краю, до якого веде курс.
    pub fn border_distance(self, position: Position, arena_size: f64) -> f64 {
        match self {
            BorderFacing::Right => arena_size - position.x,
            BorderFacing::Bottom => arena_size - position.y,
            BorderFacing::Left => position.x,
            BorderFacing::Top => position.y,
        }
    }
}

/// Режим гармати.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShootingMode {
    /// Можна шукати ціль і стріляти.
    #[default]
    Scanning,
    /// Снаряд у польоті, новий постріл заборонено.
    AwaitingDetonation,
}

/// Поведінка агента протягом гри.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Обхід арени вздовж країв і стрільба з бісекцією сектора.
    #[default]
    Circler,
    /// Втеча від найближчого суперника без стрільби.
    ScaredyCat,
}

/// Налаштування поведінки агента.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub name: String,
    pub strategy: Strategy,
    pub cruise_speed: f64,
    pub flee_speed: f64,
    pub border_distance_min: f64,
    pub speed_check_interval: u32,
    pub scan_depth: u32,
    /// Пауза між опитуваннями, поки агент мертвий. 0 вимикає паузу.
    pub dead_poll_delay_ms: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "Circler".into(),
            strategy: Strategy::Circler,
            cruise_speed: 100.0,
            flee_speed: 30.0,
            border_distance_min: 300.0,
            speed_check_interval: 2,
            scan_depth: 3,
            dead_poll_delay_ms: 0,
        }
    }
}

/// Запити агента до сервера арени.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type")]
pub enum Request {
    #[serde(rename = "joinRequest")]
    Join { name: String },
    #[serde(rename = "getInfoRequest")]
    GetInfo,
    #[serde(rename = "getLocationRequest")]
    GetLocation,
    #[serde(rename = "getSpeedRequest")]
    GetSpeed,
    #[serde(rename = "setSpeedRequest", rename_all = "camelCase")]
    SetSpeed { requested_speed: f64 },
    #[serde(rename = "getDirectionRequest")]
    GetDirection,
    #[serde(rename = "setDirectionRequest", rename_all = "camelCase")]
    SetDirection { requested_direction: f64 },
    #[serde(rename = "scanRequest", rename_all = "camelCase")]
    Scan { start_radians: f64, end_radians: f64 },
    #[serde(rename = "getCanonRequest")]
    GetCanon,
    #[serde(rename = "fireCanonRequest")]
    Fire { direction: f64, distance: f64 },
}

impl Request {
    pub const fn kind(&self) -> &'static str {
        match self {
            Request::Join { .. } => "joinRequest",
            Request::GetInfo => "getInfoRequest",
            Request::GetLocation => "getLocationRequest",
            Request::GetSpeed => "getSpeedRequest",
            Request::SetSpeed { .. } => "setSpeedRequest",
            Request::GetDirection => "getDirectionRequest",
            Request::SetDirection { .. } => "setDirectionRequest",
            Request::Scan { .. } => "scanRequest",
            Request::GetCanon => "getCanonRequest",
            Request::Fire { .. } => "fireCanonRequest",
        }
    }
}

/// Відповіді сервера. Невідомі поля ігноруються.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Reply {
    #[serde(rename = "joinReply")]
    Join { conf: ArenaConfig },
    #[serde(rename = "getInfoReply")]
    Info(AgentState),
    #[serde(rename = "getLocationReply")]
    Location(Position),
    #[serde(rename = "getSpeedReply", rename_all = "camelCase")]
    Speed { current_speed: f64 },
    #[serde(rename = "setSpeedReply")]
    SpeedSet,
    #[serde(rename = "getDirectionReply", rename_all = "camelCase")]
    Direction { current_direction: f64 },
    #[serde(rename = "setDirectionReply")]
    DirectionSet,
    #[serde(rename = "scanReply")]
    Scan { distance: f64 },
    #[serde(rename = "getCanonReply", rename_all = "camelCase")]
    Canon { shell_in_progress: bool },
    #[serde(rename = "fireCanonReply")]
    Fired,
    /// Сервер відхилив запит, наприклад тому, що агент уже мертвий.
    #[serde(rename = "Error")]
    Error { result: String },
}

impl Reply {
    pub const fn kind(&self) -> &'static str {
        match self {
            Reply::Join { .. } => "joinReply",
            Reply::Info(_) => "getInfoReply",
            Reply::Location(_) => "getLocationReply",
            Reply::Speed { .. } => "getSpeedReply",
            Reply::SpeedSet => "setSpeedReply",
            Reply::Direction { .. } => "getDirectionReply",
            Reply::DirectionSet => "setDirectionReply",
            Reply::Scan { .. } => "scanReply",
            Reply::Canon { .. } => "getCanonReply",
            Reply::Fired => "fireCanonReply",
            Reply::Error { .. } => "Error",
        }
    }
}

/// Помилки обміну запит/відповідь із сервером.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("помилка сокета: {0}")]
    Io(#[from] std::io::Error),
    #[error("не вдалося закодувати запит: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    #[error("не вдалося розібрати відповідь: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
    #[error("сервер не відповів після {attempts} спроб")]
    Timeout { attempts: u32 },
    #[error("сервер відхилив запит: {0}")]
    Rejected(String),
    #[error("очікували {expected}, отримали {got}")]
    UnexpectedReply {
        expected: &'static str,
        got: &'static str,
    },
}

/// Помилки, після яких агент не може продовжувати роботу.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("сервер арени недоступний: {0}")]
    ServerUnreachable(#[source] TransportError),
    #[error("не вдалося приєднатися до сервера: {0}")]
    JoinFailed(#[source] TransportError),
}
