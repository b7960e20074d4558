// Adapters layer: concrete implementations of the domain ports for external systems.

pub mod openai;
pub mod supabase;

pub use openai::OpenAiProvider;
pub use supabase::SupabaseClient;
