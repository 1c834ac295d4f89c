// Copyright 2024 Wladimir Palant
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![doc = include_str!("../README.md")]

use clap::Parser;
use fake_root_module::{FakeRootHandler, FakeRootOpt};
use log::error;
use pandora_module_utils::{merge_conf, merge_opt, FromYaml, RequestFilter};
use startup_module::{DefaultApp, StartupConf, StartupOpt};

#[derive(Debug, Clone, RequestFilter)]
struct Handler {
    fake_root: FakeRootHandler,
}

/// Run fake root server
#[merge_opt]
struct Opt {
    startup: StartupOpt,
    fake_root: FakeRootOpt,
}

/// The configuration of fake root server
#[merge_conf]
struct Conf {
    startup: StartupConf,
    handler: <Handler as RequestFilter>::Conf,
}

fn main() {
    env_logger::init();

    let opt = Opt::parse();

    let mut conf = match Conf::load_from_files(opt.startup.conf.as_deref().unwrap_or(&[])) {
        Ok(conf) => conf,
        Err(err) => {
            error!("{err}");
            Conf::default()
        }
    };

    conf.handler.fake_root.merge_with_opt(opt.fake_root);

    let server = match DefaultApp::<Handler>::from_conf(conf.handler)
        .and_then(|app| conf.startup.into_server(app, Some(opt.startup)))
    {
        Ok(server) => server,
        Err(err) => {
            error!("{err}");
            return;
        }
    };

    server.run_forever();
}
