//! 程序入口：解析命令行、初始化日志、加载 Slint UI 并绑定 VM 回调

use std::{cell::RefCell, path::PathBuf, rc::Rc};

use clap::Parser;
use slint::{ComponentHandle, ModelRc, VecModel};
use tracing_subscriber::fmt::SubscriberBuilder;

use yamlviewer::vm::bridge::*;
use yamlviewer::{utils, AppState, Preferences, ViewId, ViewRow};

slint::include_modules!();

/// 只读YAML树形查看器，按 F5 重新加载当前文件
#[derive(Parser)]
#[command(name = "yamlviewer", version, about)]
struct Cli {
    /// 启动时加载的YAML文件
    file: Option<PathBuf>,
}

// TreeNodeData转换实现
impl From<&ViewRow> for TreeNodeData {
    /// 将视图行转换为Slint可用的数据结构
    fn from(row: &ViewRow) -> Self {
        Self {
            id: row.id.index() as i32,
            generation: row.id.generation() as i32,
            label: row.label.clone().into(),
            value: row.value.clone().into(),
            path: row.path.clone().into(),
            depth: row.depth as i32,
            expandable: row.expandable,
            expanded: row.open,
        }
    }
}

fn view_id(id: i32, generation: i32) -> ViewId {
    ViewId::from_parts(id as u32, generation as u32)
}

/// VM桥接器：管理UI与数据层的交互
struct ViewModelBridge {
    app_state: Rc<RefCell<AppState>>,
}

impl ViewModelBridge {
    /// 创建新的VM桥接器并绑定所有回调
    fn new(app_window: &AppWindow, app_state: Rc<RefCell<AppState>>) -> Self {
        let bridge = Self { app_state };
        bridge.setup_callbacks(app_window);
        bridge
    }

    /// 设置所有UI回调函数
    fn setup_callbacks(&self, app_window: &AppWindow) {
        let app_state = self.app_state.clone();

        // === 打开文件回调 ===
        {
            let app_state = app_state.clone();
            let app_window_weak = app_window.as_weak();
            app_window.on_load_file(move || {
                if let Some(app_window) = app_window_weak.upgrade() {
                    Self::handle_load_file(&app_window, &app_state);
                }
            });
        }

        // === 重新加载回调（F5） ===
        {
            let app_state = app_state.clone();
            let app_window_weak = app_window.as_weak();
            app_window.on_reload_file(move || {
                if let Some(app_window) = app_window_weak.upgrade() {
                    Self::handle_reload_file(&app_window, &app_state);
                }
            });
        }

        // === 节点展开/折叠回调 ===
        {
            let app_state = app_state.clone();
            let app_window_weak = app_window.as_weak();
            app_window.on_toggle_node_expanded(move |id, generation| {
                if let Some(app_window) = app_window_weak.upgrade() {
                    Self::handle_toggle_node_expanded(&app_window, &app_state, view_id(id, generation));
                }
            });
        }

        // === 全部展开回调 ===
        {
            let app_state = app_state.clone();
            let app_window_weak = app_window.as_weak();
            app_window.on_expand_all(move || {
                if let Some(app_window) = app_window_weak.upgrade() {
                    let passes = app_state.borrow_mut().expand_all();
                    Self::rebuild_tree_model(&app_window, &app_state);
                    app_window.set_status_message(format!("已展开 {} 个分支", passes).into());
                }
            });
        }

        // === 节点选择回调 ===
        {
            let app_state = app_state.clone();
            let app_window_weak = app_window.as_weak();
            app_window.on_node_selected(move |id, generation| {
                if let Some(app_window) = app_window_weak.upgrade() {
                    let path = app_state
                        .borrow()
                        .tree
                        .node(view_id(id, generation))
                        .map(|n| n.path.clone())
                        .unwrap_or_default();
                    app_window.set_selected_id(id);
                    app_window.set_selected_generation(generation);
                    app_window.set_selected_path(path.into());
                }
            });
        }

        // === 复制按钮回调 ===
        {
            let app_state = app_state.clone();
            let app_window_weak = app_window.as_weak();
            app_window.on_copy_pressed(move || {
                if let Some(app_window) = app_window_weak.upgrade() {
                    Self::handle_copy_pressed(&app_window, &app_state);
                }
            });
        }

        // === 消息对话框回调 ===
        {
            let app_window_weak = app_window.as_weak();
            app_window.on_show_message_dialog(move |title, text| {
                if let Some(app_window) = app_window_weak.upgrade() {
                    app_window.set_message_dialog_title(title);
                    app_window.set_message_dialog_text(text);
                    app_window.set_message_dialog_visible(true);
                }
            });
        }

        {
            let app_window_weak = app_window.as_weak();
            app_window.on_close_message_dialog(move || {
                if let Some(app_window) = app_window_weak.upgrade() {
                    app_window.set_message_dialog_visible(false);
                }
            });
        }
    }

    /// 初始化UI状态
    fn initialize_ui(&self, app_window: &AppWindow) {
        app_window.set_status_message(STATUS_READY.into());
        app_window.set_current_path("".into());
        Self::clear_selection(app_window);

        // 设置空的树模型
        let empty_model = ModelRc::new(VecModel::<TreeNodeData>::default());
        app_window.set_tree_model(empty_model);
    }

    fn clear_selection(app_window: &AppWindow) {
        app_window.set_selected_id(-1);
        app_window.set_selected_generation(-1);
        app_window.set_selected_path("".into());
    }

    /// 显示文件选择对话框，从上次使用的目录开始
    fn show_file_dialog(start_dir: &std::path::Path) -> Option<PathBuf> {
        use rfd::FileDialog;

        let file_path = FileDialog::new()
            .add_filter("YAML文件", &["yaml", "yml"])
            .add_filter("所有文件", &["*"])
            .set_title("打开YAML文件")
            .set_directory(start_dir)
            .pick_file();

        match file_path {
            Some(path) => {
                tracing::info!("用户选择了文件: {}", path.display());
                Some(path)
            }
            None => {
                tracing::info!("用户取消了文件选择");
                None
            }
        }
    }

    /// 处理打开文件操作
    fn handle_load_file(app_window: &AppWindow, app_state: &Rc<RefCell<AppState>>) {
        let start_dir = app_state.borrow().preferences.directory.clone();
        let file_path = match Self::show_file_dialog(&start_dir) {
            Some(path) => path,
            None => {
                app_window.set_status_message(STATUS_NO_FILE_SELECTED.into());
                return;
            }
        };
        Self::open_path(app_window, app_state, &file_path);
    }

    /// 加载指定路径；失败时保持当前显示的树不变
    fn open_path(app_window: &AppWindow, app_state: &Rc<RefCell<AppState>>, file_path: &std::path::Path) {
        app_window.set_status_message(STATUS_LOADING.into());

        let load_result = app_state.borrow_mut().load_file(file_path);
        match load_result {
            Ok(top_level) => {
                app_window.set_current_path(file_path.display().to_string().into());
                Self::clear_selection(app_window);
                Self::rebuild_tree_model(app_window, app_state);
                app_window.set_status_message(loaded_status(file_path, top_level).into());
            }
            Err(e) => {
                tracing::error!("文件加载失败: {}", e);
                Self::report_error(app_window, &e);
            }
        }
    }

    /// 处理重新加载：重新读取当前文件并从头重建树
    fn handle_reload_file(app_window: &AppWindow, app_state: &Rc<RefCell<AppState>>) {
        let reload_result = app_state.borrow_mut().reload();
        match reload_result {
            Ok(top_level) => {
                Self::clear_selection(app_window);
                Self::rebuild_tree_model(app_window, app_state);
                let path = app_state.borrow().source_path.clone().unwrap_or_default();
                app_window.set_status_message(loaded_status(&path, top_level).into());
                tracing::info!("已重新加载: {}", path.display());
            }
            Err(e) => {
                tracing::error!("重新加载失败: {}", e);
                Self::report_error(app_window, &e);
            }
        }
    }

    /// 处理节点展开/折叠切换
    fn handle_toggle_node_expanded(app_window: &AppWindow, app_state: &Rc<RefCell<AppState>>, id: ViewId) {
        let toggle_result = app_state.borrow_mut().toggle_node_expanded(id);
        match toggle_result {
            Ok(open) => {
                Self::rebuild_tree_model(app_window, app_state);
                let label = app_state
                    .borrow()
                    .tree
                    .node(id)
                    .map(|n| n.label.clone())
                    .unwrap_or_default();
                app_window.set_status_message(toggled_status(&label, open).into());
            }
            Err(e) => {
                tracing::warn!("节点切换失败: {}", e);
                app_window.set_status_message(error_status(&e).into());
            }
        }
    }

    /// 处理复制按钮：复制选中节点的值
    fn handle_copy_pressed(app_window: &AppWindow, app_state: &Rc<RefCell<AppState>>) {
        let id = view_id(app_window.get_selected_id(), app_window.get_selected_generation());
        let text = match app_state.borrow().copy_text_for(id) {
            Ok(text) => text,
            Err(e) => {
                app_window.set_status_message(error_status(&e).into());
                return;
            }
        };

        match utils::clipboard::copy_to_clipboard(&text) {
            Ok(()) => {
                app_window.set_status_message(STATUS_COPIED.into());
                tracing::info!("内容已复制到剪贴板，长度: {} 字符", text.len());
            }
            Err(e) => {
                app_window.set_status_message(error_status(&e).into());
                tracing::error!("复制失败: {}", e);
            }
        }
    }

    /// 状态栏 + 对话框两处提示错误
    fn report_error(app_window: &AppWindow, err: &dyn std::fmt::Display) {
        let error_msg = error_status(err);
        app_window.set_status_message(error_msg.clone().into());
        app_window.invoke_show_message_dialog(DIALOG_TITLE_ERROR.into(), error_msg.into());
    }

    /// 重新构建树模型（只包含可见行）
    fn rebuild_tree_model(app_window: &AppWindow, app_state: &Rc<RefCell<AppState>>) {
        let tree_data: Vec<TreeNodeData> = app_state
            .borrow()
            .rows()
            .iter()
            .map(TreeNodeData::from)
            .collect();

        let model = ModelRc::new(VecModel::from(tree_data));
        app_window.set_tree_model(model);
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 初始化日志输出
    let _ = SubscriberBuilder::default()
        .with_max_level(tracing::Level::INFO)
        .try_init();

    let app = AppWindow::new()?;
    let state = Rc::new(RefCell::new(AppState::new(Preferences::load())));

    // 创建VM桥接器并绑定UI回调
    let bridge = ViewModelBridge::new(&app, state.clone());
    bridge.initialize_ui(&app);

    if let Some(file) = cli.file.as_deref() {
        ViewModelBridge::open_path(&app, &state, file);
    }

    tracing::info!("应用启动成功，UI已初始化");
    let run_result = app.run();

    // 退出时尽力保存偏好设置，失败只记录日志
    state.borrow().preferences.save();
    run_result?;
    Ok(())
}
