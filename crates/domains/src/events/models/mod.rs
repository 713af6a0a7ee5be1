pub mod economic_event;
