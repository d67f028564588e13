// src/services/mod.rs
pub mod chat_service;
pub mod knowledge_base;
pub mod message_service;
pub mod notification_service;
pub mod session_service;
pub mod typing_service;

pub use chat_service::ChatService;
pub use knowledge_base::KnowledgeBaseService;
pub use message_service::MessageService;
pub use notification_service::NotificationService;
pub use session_service::SessionService;
pub use typing_service::TypingService;
