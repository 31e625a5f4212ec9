use thiserror::Error;

#[derive(Error, Debug)]
pub enum PelaError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Discord error: {0}")]
    Discord(#[from] serenity::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("User {0} did not play this match")]
    NotParticipant(String),

    #[error("Voting is closed for this match")]
    VotingClosed,

    #[error("Vote already cast for this category")]
    AlreadyVoted,

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl PelaError {
    /// Text shown to the Discord user who triggered the failing interaction.
    pub fn user_message(&self) -> String {
        match self {
            PelaError::NotFound(what) => format!("{} não encontrado(a).", what),
            PelaError::Forbidden(reason) => format!("Sem permissão: {}", reason),
            PelaError::InvalidInput(reason) => format!("Entrada inválida: {}", reason),
            PelaError::NotParticipant(_) => {
                "Só quem confirmou presença na partida pode votar ou receber votos.".to_string()
            }
            PelaError::VotingClosed => "A votação desta partida não está aberta.".to_string(),
            PelaError::AlreadyVoted => "Você já votou nesta categoria para esta partida.".to_string(),
            PelaError::Database(_)
            | PelaError::Discord(_)
            | PelaError::Config(_)
            | PelaError::Corrupt(_) => "Erro interno. Tente novamente mais tarde.".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PelaError>;
