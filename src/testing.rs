//! Транспорт за сценарієм для модульних тестів.

use crate::core::{AgentState, Position, Reply, Request, TransportError};
use crate::transport::{Transport, TransportStats};
use std::collections::VecDeque;

/// Відтворює заздалегідь задані відповіді на запити-питання і записує всі запити.
///
/// Команди (`setSpeed`, `setDirection`, `fireCanon`) підтверджуються автоматично.
/// Коли сценарій вичерпано, кожне питання завершується тайм-аутом.
/// Помилки з `command_failures` повертаються замість найближчих підтверджень.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: VecDeque<Result<Reply, TransportError>>,
    command_failures: VecDeque<TransportError>,
    pub sent: Vec<Request>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, reply: Reply) -> Self {
        self.push(reply);
        self
    }

    pub fn push(&mut self, reply: Reply) {
        self.replies.push_back(Ok(reply));
    }

    pub fn push_err(&mut self, err: TransportError) {
        self.replies.push_back(Err(err));
    }

    pub fn push_command_err(&mut self, err: TransportError) {
        self.command_failures.push_back(err);
    }

    pub fn info(game_number: u64, health: f64) -> Reply {
        Reply::Info(AgentState {
            game_number,
            health,
            points: 0.0,
        })
    }

    pub fn location(x: f64, y: f64) -> Reply {
        Reply::Location(Position { x, y })
    }

    pub fn scan(distance: f64) -> Reply {
        Reply::Scan { distance }
    }

    pub fn remaining(&self) -> usize {
        self.replies.len()
    }

    pub fn take_sent(&mut self) -> Vec<Request> {
        std::mem::take(&mut self.sent)
    }
}

impl Transport for ScriptedTransport {
    async fn send_recv(&mut self, request: Request) -> Result<Reply, TransportError> {
        let ack = match request {
            Request::SetSpeed { .. } => Some(Reply::SpeedSet),
            Request::SetDirection { .. } => Some(Reply::DirectionSet),
            Request::Fire { .. } => Some(Reply::Fired),
            _ => None,
        };
        self.sent.push(request);
        match ack {
            Some(reply) => match self.command_failures.pop_front() {
                Some(err) => Err(err),
                None => Ok(reply),
            },
            None => self
                .replies
                .pop_front()
                .unwrap_or(Err(TransportError::Timeout { attempts: 1 })),
        }
    }

    fn stats(&self) -> TransportStats {
        TransportStats {
            sent: self.sent.len() as u64,
            ..TransportStats::default()
        }
    }
}
