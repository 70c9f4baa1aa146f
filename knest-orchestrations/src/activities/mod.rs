pub mod address_pool;
pub mod compose_overlay;
pub mod credential;
pub mod deploy_cluster;
pub mod ensure_namespace;
pub mod get_endpoint;
pub mod install_ladder;
pub mod probe;
pub mod render_template;
pub mod wait_for_ready;
