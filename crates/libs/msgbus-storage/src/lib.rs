pub mod buffer_pool;
pub mod priority_queue;
pub mod serialized_storage;

pub use buffer_pool::BufferPool;
pub use priority_queue::PriorityQueue;
pub use serialized_storage::SerializedMessageStorage;
