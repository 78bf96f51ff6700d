use crate::core::{AgentState, ArenaConfig, Position, Reply, Request, TransportError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::{debug, trace};

/// Максимальний розмір UDP-датаграми.
const MAX_DATAGRAM: usize = 65_507;

/// Параметри мережі та політика повторів.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub bind_ip: IpAddr,
    pub bind_port: u16,
    pub server_ip: IpAddr,
    pub server_port: u16,
    pub retries: u32,
    pub retry_delay_secs: f64,
    pub delay_multiplier: f64,
    pub join_retries: u32,
    pub join_delay_secs: f64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            bind_port: 20010,
            server_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            server_port: 20000,
            retries: 10,
            retry_delay_secs: 0.1,
            delay_multiplier: 1.2,
            join_retries: 300,
            join_delay_secs: 1.0,
        }
    }
}

impl NetworkConfig {
    pub fn local_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.bind_port)
    }

    pub fn server_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server_ip, self.server_port)
    }

    fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retries, self.retry_delay_secs, self.delay_multiplier)
    }

    /// Приєднання чекає, поки сервер запуститься, тому затримка не зростає.
    fn join_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.join_retries, self.join_delay_secs, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct RetryPolicy {
    retries: u32,
    delay: Duration,
    multiplier: f64,
}

impl RetryPolicy {
    fn new(retries: u32, delay_secs: f64, multiplier: f64) -> Self {
        Self {
            retries,
            delay: Duration::from_secs_f64(delay_secs.max(0.0)),
            multiplier: multiplier.max(1.0),
        }
    }
}

/// Лічильники обміну, які виводяться в журнал під час завершення роботи.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStats {
    pub sent: u64,
    pub received: u64,
    pub retries: u64,
    pub stale: u64,
    pub errors: u64,
}

impl fmt::Display for TransportStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "відправлено={} отримано={} повторів={} застарілих={} помилок={}",
            self.sent, self.received, self.retries, self.stale, self.errors
        )
    }
}

/// Синхронний обмін запит/відповідь із сервером арени.
///
/// Реалізація відповідає лише за `send_recv`; типізовані методи
/// перевіряють тип відповіді та перетворюють `Error` на [`TransportError::Rejected`].
pub trait Transport {
    async fn send_recv(&mut self, request: Request) -> Result<Reply, TransportError>;

    fn stats(&self) -> TransportStats;

    async fn join(&mut self, name: &str) -> Result<ArenaConfig, TransportError> {
        let request = Request::Join { name: name.into() };
        match self.send_recv(request).await? {
            Reply::Join { conf } => Ok(conf),
            other => Err(unexpected("joinReply", other)),
        }
    }

    async fn get_info(&mut self) -> Result<AgentState, TransportError> {
        match self.send_recv(Request::GetInfo).await? {
            Reply::Info(state) => Ok(state),
            other => Err(unexpected("getInfoReply", other)),
        }
    }

    async fn get_location(&mut self) -> Result<Position, TransportError> {
        match self.send_recv(Request::GetLocation).await? {
            Reply::Location(position) => Ok(position),
            other => Err(unexpected("getLocationReply", other)),
        }
    }

    async fn get_speed(&mut self) -> Result<f64, TransportError> {
        match self.send_recv(Request::GetSpeed).await? {
            Reply::Speed { current_speed } => Ok(current_speed),
            other => Err(unexpected("getSpeedReply", other)),
        }
    }

    async fn set_speed(&mut self, requested_speed: f64) -> Result<(), TransportError> {
        match self.send_recv(Request::SetSpeed { requested_speed }).await? {
            Reply::SpeedSet => Ok(()),
            other => Err(unexpected("setSpeedReply", other)),
        }
    }

    async fn get_direction(&mut self) -> Result<f64, TransportError> {
        match self.send_recv(Request::GetDirection).await? {
            Reply::Direction { current_direction } => Ok(current_direction),
            other => Err(unexpected("getDirectionReply", other)),
        }
    }

    async fn set_direction(&mut self, requested_direction: f64) -> Result<(), TransportError> {
        match self
            .send_recv(Request::SetDirection {
                requested_direction,
            })
            .await?
        {
            Reply::DirectionSet => Ok(()),
            other => Err(unexpected("setDirectionReply", other)),
        }
    }

    /// Відстань до найближчого суперника в секторі `[start, end)`, 0 якщо сектор порожній.
    async fn scan(&mut self, start_radians: f64, end_radians: f64) -> Result<f64, TransportError> {
        let request = Request::Scan {
            start_radians,
            end_radians,
        };
        match self.send_recv(request).await? {
            Reply::Scan { distance } => Ok(distance),
            other => Err(unexpected("scanReply", other)),
        }
    }

    async fn shell_in_progress(&mut self) -> Result<bool, TransportError> {
        match self.send_recv(Request::GetCanon).await? {
            Reply::Canon { shell_in_progress } => Ok(shell_in_progress),
            other => Err(unexpected("getCanonReply", other)),
        }
    }

    async fn fire(&mut self, direction: f64, distance: f64) -> Result<(), TransportError> {
        match self.send_recv(Request::Fire { direction, distance }).await? {
            Reply::Fired => Ok(()),
            other => Err(unexpected("fireCanonReply", other)),
        }
    }
}

fn unexpected(expected: &'static str, reply: Reply) -> TransportError {
    match reply {
        Reply::Error { result } => TransportError::Rejected(result),
        other => TransportError::UnexpectedReply {
            expected,
            got: other.kind(),
        },
    }
}

#[derive(Serialize)]
struct Outgoing<'a> {
    #[serde(rename = "msgID")]
    msg_id: u64,
    #[serde(flatten)]
    request: &'a Request,
}

#[derive(Deserialize)]
struct Incoming {
    #[serde(rename = "msgID")]
    msg_id: Option<u64>,
    #[serde(flatten)]
    reply: Reply,
}

/// Кодує запит у MessagePack-мапу з полями `type` і `msgID`.
pub fn encode(msg_id: u64, request: &Request) -> Result<Vec<u8>, TransportError> {
    Ok(rmp_serde::to_vec_named(&Outgoing { msg_id, request })?)
}

/// Розбирає відповідь сервера, повертаючи її `msgID`, якщо він є.
pub fn decode(bytes: &[u8]) -> Result<(Option<u64>, Reply), TransportError> {
    let incoming: Incoming = rmp_serde::from_slice(bytes)?;
    Ok((incoming.msg_id, incoming.reply))
}

/// Транспорт MessagePack поверх UDP з повторами та зростаючою затримкою.
pub struct UdpTransport {
    socket: UdpSocket,
    server: SocketAddr,
    policy: RetryPolicy,
    join_policy: RetryPolicy,
    next_msg_id: u64,
    stats: TransportStats,
    buf: Vec<u8>,
}

impl UdpTransport {
    pub async fn connect(config: &NetworkConfig) -> Result<Self, TransportError> {
        // Сокет не з'єднується з сервером: інакше ICMP «port unreachable»
        // обриває обмін замість чергового повтору.
        let socket = UdpSocket::bind(config.local_addr()).await?;
        debug!(
            local = %config.local_addr(),
            server = %config.server_addr(),
            "Сокет відкрито"
        );
        Ok(Self {
            socket,
            server: config.server_addr(),
            policy: config.policy(),
            join_policy: config.join_policy(),
            next_msg_id: 0,
            stats: TransportStats::default(),
            buf: vec![0; MAX_DATAGRAM],
        })
    }

    async fn exchange(
        &mut self,
        request: &Request,
        policy: RetryPolicy,
    ) -> Result<Reply, TransportError> {
        self.next_msg_id += 1;
        let msg_id = self.next_msg_id;
        let bytes = encode(msg_id, request)?;
        let mut delay = policy.delay;

        for attempt in 0..=policy.retries {
            if attempt > 0 {
                self.stats.retries += 1;
                trace!(msg_id, attempt, kind = request.kind(), "Повторне надсилання");
            }
            self.socket.send_to(&bytes, self.server).await?;
            self.stats.sent += 1;

            match timeout(delay, self.recv_matching(msg_id)).await {
                Ok(Ok(reply)) => return Ok(reply),
                Ok(Err(err)) => {
                    self.stats.errors += 1;
                    return Err(err);
                }
                Err(_elapsed) => delay = delay.mul_f64(policy.multiplier),
            }
        }

        self.stats.errors += 1;
        Err(TransportError::Timeout {
            attempts: policy.retries + 1,
        })
    }

    async fn recv_matching(&mut self, msg_id: u64) -> Result<Reply, TransportError> {
        loop {
            let (len, peer) = match self.socket.recv_from(&mut self.buf).await {
                Ok(received) => received,
                Err(err) if is_unreachable(&err) => {
                    trace!(error = %err, "Сервер недосяжний, чекаємо на повтор");
                    continue;
                }
                Err(err) => return Err(err.into()),
            };
            if peer != self.server {
                self.stats.stale += 1;
                trace!(%peer, "Датаграма від стороннього вузла відкинута");
                continue;
            }
            let (reply_id, reply) = decode(&self.buf[..len])?;
            self.stats.received += 1;
            if reply_id == Some(msg_id) {
                return Ok(reply);
            }
            self.stats.stale += 1;
            trace!(expected = msg_id, got = ?reply_id, "Застаріла відповідь відкинута");
        }
    }
}

/// Помилки, якими ОС повідомляє про ICMP-відмову для попередньої датаграми.
fn is_unreachable(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        std::io::ErrorKind::ConnectionRefused | std::io::ErrorKind::ConnectionReset
    )
}

impl Transport for UdpTransport {
    async fn send_recv(&mut self, request: Request) -> Result<Reply, TransportError> {
        self.exchange(&request, self.policy).await
    }

    fn stats(&self) -> TransportStats {
        self.stats
    }

    async fn join(&mut self, name: &str) -> Result<ArenaConfig, TransportError> {
        let request = Request::Join { name: name.into() };
        match self.exchange(&request, self.join_policy).await? {
            Reply::Join { conf } => Ok(conf),
            other => Err(unexpected("joinReply", other)),
        }
    }
}
