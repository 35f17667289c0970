// 资料界面
// 显式状态机 + 驱动它的控制器

mod profile;
mod state;

pub use profile::ProfileScreen;
pub use state::{ScreenEvent, ScreenState};
