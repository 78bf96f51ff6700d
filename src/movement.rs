use crate::core::{AgentConfig, ArenaConfig, BorderFacing, Position, TransportError};
use crate::transport::Transport;
use std::f64::consts::TAU;
use tracing::debug;

/// Допуск при порівнянні фактичного курсу з запитаним.
const HEADING_TOLERANCE: f64 = 1e-6;

/// Рух уздовж країв арени з відновленням після застрягання.
///
/// Поворот на наступний край відбувається, коли агент підходить до
/// поточного краю ближче за поріг, або коли перевірка швидкості показує,
/// що агент стоїть на місці.
pub struct BorderFollower {
    facing: BorderFacing,
    requested_heading: f64,
    ticks_since_check: u32,
    check_interval: u32,
    border_distance_min: f64,
    cruise_speed: f64,
}

impl BorderFollower {
    pub fn new(config: &AgentConfig) -> Self {
        let facing = BorderFacing::default();
        Self {
            facing,
            requested_heading: facing.heading(),
            ticks_since_check: 0,
            check_interval: config.speed_check_interval,
            border_distance_min: config.border_distance_min,
            cruise_speed: config.cruise_speed,
        }
    }

    pub fn facing(&self) -> BorderFacing {
        self.facing
    }

    /// Задає початковий курс на новій грі.
    pub async fn start<T: Transport>(&mut self, transport: &mut T) -> Result<(), TransportError> {
        transport.set_direction(self.requested_heading).await
    }

    /// Один такт руху.
    pub async fn step<T: Transport>(
        &mut self,
        transport: &mut T,
        arena: &ArenaConfig,
    ) -> Result<(), TransportError> {
        let position = transport.get_location().await?;
        let distance = self.facing.border_distance(position, arena.arena_size);
        if distance < self.border_distance_min {
            debug!(facing = ?self.facing, distance, "Край арени поруч, повертаємо");
            self.turn(transport).await?;
        }

        self.ticks_since_check += 1;
        if self.ticks_since_check >= self.check_interval {
            self.ticks_since_check = 0;
            self.check_speed(transport).await?;
        }
        Ok(())
    }

    async fn check_speed<T: Transport>(&mut self, transport: &mut T) -> Result<(), TransportError> {
        let speed = transport.get_speed().await?;
        if speed == 0.0 {
            debug!(facing = ?self.facing, "Агент застряг, змінюємо край");
            return self.turn(transport).await;
        }

        let heading = transport.get_direction().await?;
        if same_heading(heading, self.requested_heading) {
            transport.set_speed(self.cruise_speed).await?;
        }
        Ok(())
    }

    /// Перехід до наступного краю на половинній швидкості, щоб зменшити радіус повороту.
    async fn turn<T: Transport>(&mut self, transport: &mut T) -> Result<(), TransportError> {
        self.facing = self.facing.next();
        self.requested_heading = self.facing.heading();
        transport.set_direction(self.requested_heading).await?;
        transport.set_speed(self.cruise_speed / 2.0).await
    }
}

fn same_heading(a: f64, b: f64) -> bool {
    let diff = (a - b).rem_euclid(TAU);
    diff < HEADING_TOLERANCE || TAU - diff < HEADING_TOLERANCE
}

/// Чи стоїть агент впритул (з точністю до одиниці) до будь-якого краю арени.
pub fn at_edge(position: Position, arena: &ArenaConfig) -> bool {
    let low = arena.bot_radius + 1.0;
    let high = arena.arena_size - arena.bot_radius - 1.0;
    [position.x, position.y]
        .iter()
        .map(|v| v.round())
        .any(|v| v <= low || v >= high)
}
