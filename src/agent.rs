use crate::core::{
    AgentConfig, AgentError, AgentState, ArenaConfig, BorderFacing, ShootingMode, Strategy,
    TransportError,
};
use crate::movement::BorderFollower;
use crate::targeting::{Evader, FireControl};
use crate::transport::{Transport, TransportStats};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, trace, warn};

/// Дані сесії: від приєднання до сервера до завершення процесу.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub name: String,
    /// Номер останньої гри, яку бачив агент (0 — гра ще не почалася).
    pub game_number: u64,
    pub points: f64,
}

/// Стан поточної гри. Створюється наново щоразу, коли змінюється номер гри.
pub enum Tactics {
    Circler {
        movement: BorderFollower,
        fire: FireControl,
    },
    ScaredyCat {
        evader: Evader,
    },
}

impl Tactics {
    fn new(config: &AgentConfig) -> Self {
        match config.strategy {
            Strategy::Circler => Tactics::Circler {
                movement: BorderFollower::new(config),
                fire: FireControl::new(config.scan_depth),
            },
            Strategy::ScaredyCat => Tactics::ScaredyCat {
                evader: Evader::new(config.flee_speed),
            },
        }
    }

    pub fn facing(&self) -> Option<BorderFacing> {
        match self {
            Tactics::Circler { movement, .. } => Some(movement.facing()),
            Tactics::ScaredyCat { .. } => None,
        }
    }

    pub fn shooting_mode(&self) -> Option<ShootingMode> {
        match self {
            Tactics::Circler { fire, .. } => Some(fire.mode()),
            Tactics::ScaredyCat { .. } => None,
        }
    }
}

/// Агент арени: цикл опитування стану, руху та стрільби.
pub struct Agent<T: Transport> {
    transport: T,
    config: AgentConfig,
    arena: ArenaConfig,
    session: Session,
    tactics: Option<Tactics>,
}

impl<T: Transport> Agent<T> {
    /// Створює агента після успішного приєднання до сервера.
    pub fn new(transport: T, config: AgentConfig, arena: ArenaConfig) -> Self {
        Self {
            transport,
            session: Session {
                name: config.name.clone(),
                game_number: 0,
                points: 0.0,
            },
            config,
            arena,
            tactics: None,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn stats(&self) -> TransportStats {
        self.transport.stats()
    }

    /// Нескінченний цикл. Повертається лише з фатальною помилкою.
    pub async fn run(&mut self) -> Result<(), AgentError> {
        info!(name = %self.session.name, "Очікуємо початку гри");
        loop {
            self.tick().await?;
        }
    }

    /// Один такт циклу керування.
    pub async fn tick(&mut self) -> Result<(), AgentError> {
        // Запит стану дозволений навіть мертвому агенту, тож його збій фатальний.
        let state = match self.transport.get_info().await {
            Ok(state) => state,
            Err(err) => {
                error!(error = %err, "Запит стану не вдався. Чи працює ще сервер?");
                return Err(AgentError::ServerUnreachable(err));
            }
        };

        if !state.is_alive() {
            if self.config.dead_poll_delay_ms > 0 {
                sleep(Duration::from_millis(self.config.dead_poll_delay_ms)).await;
            }
            return Ok(());
        }

        if let Err(err) = self.play(state).await {
            // Найімовірніше, агент загинув після запиту стану.
            warn!(error = %err, "Такт перервано");
        }
        Ok(())
    }

    async fn play(&mut self, state: AgentState) -> Result<(), TransportError> {
        if state.game_number != self.session.game_number {
            self.start_game(state).await?;
        }
        self.session.points = state.points;

        let Some(tactics) = self.tactics.as_mut() else {
            trace!("Гра ще не почалася");
            return Ok(());
        };
        match tactics {
            Tactics::Circler { movement, fire } => {
                movement.step(&mut self.transport, &self.arena).await?;
                fire.step(&mut self.transport).await?;
            }
            Tactics::ScaredyCat { evader } => {
                evader.step(&mut self.transport, &self.arena).await?;
            }
        }
        trace!(
            facing = ?tactics.facing(),
            mode = ?tactics.shooting_mode(),
            "Такт завершено"
        );
        Ok(())
    }

    /// Номер гри фіксується лише після того, як нова тактика стартувала,
    /// тож невдалий старт повториться на наступному такті.
    async fn start_game(&mut self, state: AgentState) -> Result<(), TransportError> {
        if state.game_number == 0 {
            self.session.game_number = 0;
            self.tactics = None;
            return Ok(());
        }

        info!(
            game = state.game_number,
            points = state.points,
            "Гра {} почалася. Очок набрано: {}",
            state.game_number,
            state.points
        );
        let mut tactics = Tactics::new(&self.config);
        if let Tactics::Circler { movement, .. } = &mut tactics {
            movement.start(&mut self.transport).await?;
        }
        self.tactics = Some(tactics);
        self.session.game_number = state.game_number;
        Ok(())
    }
}
