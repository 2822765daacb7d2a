//! # 模板集缓存
//!
//! 注册表由一把读写锁保护，内含两张表：集名 → 已编译模板、集名 → 选项。
//! 重新编译在读写锁外完成，随后在写锁内整体替换，读者只会看到旧的完整集合
//! 或新的完整集合。所有重建（读取选项、编译、发布）由另一把互斥锁串行化，
//! 后发起的重建总是基于先完成的重建所发布的选项。

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::{debug, warn};
use tera::{Context, Tera};

use crate::compiler::compile;
use crate::exception::TemplateError;
use crate::options::Options;

/// 一代已编译的模板集
struct CompiledSet {
    tera: Arc<Tera>,
    /// 编译时一次性收集的模板名
    names: HashSet<String>,
}

impl CompiledSet {
    fn new(tera: Tera) -> Self {
        let names = tera.get_template_names().map(String::from).collect();
        Self {
            tera: Arc::new(tera),
            names,
        }
    }
}

#[derive(Default)]
struct Registry {
    templates: HashMap<String, CompiledSet>,
    options: HashMap<String, Arc<Options>>,
}

/// 查找得到的已编译模板句柄。
///
/// 持有所在模板集与其选项的共享引用，即使之后该集合被整体替换，
/// 句柄仍指向查找时的那一代集合。
#[derive(Clone)]
pub struct CompiledTemplate {
    name: String,
    set: Arc<Tera>,
    options: Arc<Options>,
}

impl CompiledTemplate {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// 执行模板并把输出直接写入 `writer`。
    pub fn execute_writer(&self, data: &Context, writer: impl Write) -> Result<(), TemplateError> {
        self.set
            .render_to(&self.name, data, writer)
            .map_err(|source| TemplateError::Execute {
                name: self.name.clone(),
                source,
            })
    }

    /// 执行模板并返回渲染结果。
    pub fn execute(&self, data: &Context) -> Result<String, TemplateError> {
        self.set
            .render(&self.name, data)
            .map_err(|source| TemplateError::Execute {
                name: self.name.clone(),
                source,
            })
    }
}

#[derive(Default)]
pub struct TemplateCache {
    registry: RwLock<Registry>,
    rebuild: Mutex<()>,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Registry> {
        match self.registry.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("模板注册表读锁被污染，恢复并继续");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, Registry> {
        match self.registry.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("模板注册表写锁被污染，恢复并继续");
                poisoned.into_inner()
            }
        }
    }

    fn lock_rebuild(&self) -> MutexGuard<'_, ()> {
        match self.rebuild.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("模板重建锁被污染，恢复并继续");
                poisoned.into_inner()
            }
        }
    }

    /// 编译并发布一个模板集。`options` 应当已经过 `prepare_options` 处理。
    ///
    /// 编译失败时注册表保持原样，已有的同名集合继续可用。
    pub fn install(&self, options: Options) -> Result<(), TemplateError> {
        let _rebuild = self.lock_rebuild();
        self.publish(options)
    }

    /// 用已保存的选项重新编译某个模板集。
    pub fn recompile(&self, set: &str) -> Result<(), TemplateError> {
        let _rebuild = self.lock_rebuild();
        let options = self.options(set)?;
        debug!("重新编译模板集{}", set);
        self.publish(options)
    }

    /// 切换模板集的根目录并立即重新编译。
    pub fn set_directory(&self, set: &str, directory: &str) -> Result<(), TemplateError> {
        let _rebuild = self.lock_rebuild();
        let mut options = self.options(set)?;
        options.directory = directory.to_string();
        self.publish(options)
    }

    /// 调用方必须持有重建锁
    fn publish(&self, options: Options) -> Result<(), TemplateError> {
        let compiled = CompiledSet::new(compile(&options)?);
        let mut registry = self.write();
        registry.templates.insert(options.name.clone(), compiled);
        registry
            .options
            .insert(options.name.clone(), Arc::new(options));
        Ok(())
    }

    /// 查找模板。读锁只在查找期间持有，模板与选项取自同一代集合。
    pub fn lookup(&self, set: &str, name: &str) -> Result<CompiledTemplate, TemplateError> {
        let registry = self.read();
        let (compiled, options) = match (registry.templates.get(set), registry.options.get(set)) {
            (Some(t), Some(o)) => (t, o),
            _ => return Err(TemplateError::SetUndefined(set.to_string())),
        };
        if !compiled.names.contains(name) {
            return Err(TemplateError::TemplateUndefined {
                set: set.to_string(),
                name: name.to_string(),
            });
        }
        Ok(CompiledTemplate {
            name: name.to_string(),
            set: Arc::clone(&compiled.tera),
            options: Arc::clone(options),
        })
    }

    /// 取出模板集的选项副本。
    pub fn options(&self, set: &str) -> Result<Options, TemplateError> {
        self.read()
            .options
            .get(set)
            .map(|o| o.as_ref().clone())
            .ok_or_else(|| TemplateError::SetUndefined(set.to_string()))
    }

    pub fn contains_set(&self, set: &str) -> bool {
        self.read().templates.contains_key(set)
    }

    pub fn set_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().templates.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn template_names(&self, set: &str) -> Result<Vec<String>, TemplateError> {
        let registry = self.read();
        let compiled = registry
            .templates
            .get(set)
            .ok_or_else(|| TemplateError::SetUndefined(set.to_string()))?;
        let mut names: Vec<String> = compiled.names.iter().cloned().collect();
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::prepare_options;
    use crate::param::DEFAULT_SET_NAME;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn default_set(dir: &TempDir) -> Options {
        prepare_options(Some(Options::with_directory(dir.path().to_str().unwrap())))
    }

    #[test]
    fn test_install_and_lookup() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "hello.tmpl", "hi");

        let cache = TemplateCache::new();
        cache.install(default_set(&dir)).unwrap();

        assert!(cache.contains_set(DEFAULT_SET_NAME));
        let template = cache.lookup(DEFAULT_SET_NAME, "hello").unwrap();
        assert_eq!(template.name(), "hello");
        assert_eq!(cache.template_names(DEFAULT_SET_NAME).unwrap(), vec!["hello"]);
    }

    #[test]
    fn test_lookup_unknown_template() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "hello.tmpl", "hi");

        let cache = TemplateCache::new();
        cache.install(default_set(&dir)).unwrap();

        let err = cache.lookup(DEFAULT_SET_NAME, "nope").err().unwrap();
        assert_eq!(err.to_string(), "pongo2: \"nope\" is undefined");
    }

    #[test]
    fn test_lookup_unknown_set() {
        let cache = TemplateCache::new();
        let err = cache.lookup("ghost", "hello").err().unwrap();
        assert!(matches!(err, TemplateError::SetUndefined(ref s) if s == "ghost"));
        assert!(cache.recompile("ghost").is_err());
    }

    #[test]
    fn test_recompile_replaces_whole_set() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.tmpl", "a");
        write(dir.path(), "b.tmpl", "b");

        let cache = TemplateCache::new();
        cache.install(default_set(&dir)).unwrap();

        fs::remove_file(dir.path().join("b.tmpl")).unwrap();
        write(dir.path(), "c.tmpl", "c");
        cache.recompile(DEFAULT_SET_NAME).unwrap();

        assert_eq!(cache.template_names(DEFAULT_SET_NAME).unwrap(), vec!["a", "c"]);
    }

    #[test]
    fn test_failed_recompile_keeps_previous_set() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.tmpl", "a");

        let cache = TemplateCache::new();
        cache.install(default_set(&dir)).unwrap();

        write(dir.path(), "a.tmpl", "{% for %}");
        assert!(cache.recompile(DEFAULT_SET_NAME).is_err());

        let template = cache.lookup(DEFAULT_SET_NAME, "a").unwrap();
        assert_eq!(template.execute(&Context::new()).unwrap(), "a");
    }

    #[test]
    fn test_handle_outlives_recompile() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "hello.tmpl", "old");

        let cache = TemplateCache::new();
        cache.install(default_set(&dir)).unwrap();
        let old = cache.lookup(DEFAULT_SET_NAME, "hello").unwrap();

        write(dir.path(), "hello.tmpl", "new");
        cache.recompile(DEFAULT_SET_NAME).unwrap();
        let new = cache.lookup(DEFAULT_SET_NAME, "hello").unwrap();

        assert_eq!(old.execute(&Context::new()).unwrap(), "old");
        assert_eq!(new.execute(&Context::new()).unwrap(), "new");
    }

    #[test]
    fn test_set_directory() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        write(first.path(), "hello.tmpl", "one");
        write(second.path(), "hello.tmpl", "two");

        let cache = TemplateCache::new();
        cache.install(default_set(&first)).unwrap();
        cache
            .set_directory(DEFAULT_SET_NAME, second.path().to_str().unwrap())
            .unwrap();

        let template = cache.lookup(DEFAULT_SET_NAME, "hello").unwrap();
        assert_eq!(template.execute(&Context::new()).unwrap(), "two");
        assert_eq!(
            cache.options(DEFAULT_SET_NAME).unwrap().directory,
            second.path().to_str().unwrap()
        );
    }

    #[test]
    fn test_set_directory_survives_concurrent_recompile() {
        let slow = TempDir::new().unwrap();
        let fast = TempDir::new().unwrap();
        for i in 0..2000 {
            write(slow.path(), &format!("page{}.tmpl", i), "{{ x }}");
        }
        write(slow.path(), "hello.tmpl", "slow");
        write(fast.path(), "hello.tmpl", "fast");

        let cache = Arc::new(TemplateCache::new());
        cache.install(default_set(&slow)).unwrap();

        let recompiling = {
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || cache.recompile(DEFAULT_SET_NAME).unwrap())
        };
        std::thread::sleep(std::time::Duration::from_millis(20));
        cache
            .set_directory(DEFAULT_SET_NAME, fast.path().to_str().unwrap())
            .unwrap();
        recompiling.join().unwrap();

        assert_eq!(
            cache.options(DEFAULT_SET_NAME).unwrap().directory,
            fast.path().to_str().unwrap()
        );
        let template = cache.lookup(DEFAULT_SET_NAME, "hello").unwrap();
        assert_eq!(template.execute(&Context::new()).unwrap(), "fast");
    }

    #[test]
    fn test_named_sets_are_independent() {
        let main = TempDir::new().unwrap();
        let admin = TempDir::new().unwrap();
        write(main.path(), "index.html", "main");
        write(admin.path(), "index.html", "admin");

        let cache = TemplateCache::new();
        cache.install(default_set(&main)).unwrap();
        cache
            .install(prepare_options(Some(Options::named(
                "admin",
                admin.path().to_str().unwrap(),
            ))))
            .unwrap();

        assert_eq!(cache.set_names(), vec!["admin", DEFAULT_SET_NAME]);
        let template = cache.lookup("admin", "index").unwrap();
        assert_eq!(template.execute(&Context::new()).unwrap(), "admin");
        assert_eq!(template.options().name, "admin");
    }
}
